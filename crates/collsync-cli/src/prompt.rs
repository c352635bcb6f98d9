use collsync_core::Tier;
use std::io::{self, Write};

pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            // stdin closed; nobody is there to answer
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

/// Asks which tier decides that an existing backup file is the same.
/// Nothing means size, one character means fast hash, more means strong hash.
pub fn prompt_comparison_mode() -> io::Result<Tier> {
    println!(" COMPARISON MODE for files present in destination");
    println!(" - fast - by file size (enter nothing)");
    println!(" - medium - by xxhash (enter any char)");
    println!(" - slow - by blake3 (enter any 2 chars)");
    print!(" Enter response: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(mode_from_response(&input))
}

fn mode_from_response(input: &str) -> Tier {
    match input.trim_end_matches(['\r', '\n']).chars().count() {
        0 => Tier::Size,
        1 => Tier::FastHash,
        _ => Tier::StrongHash,
    }
}
