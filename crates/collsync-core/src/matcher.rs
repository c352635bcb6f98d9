use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::error::Error;
use crate::hasher::{Comparator, Tier};
use crate::record::FileRecord;
use crate::token::naming_token;

#[derive(Error, Debug)]
pub enum MatchError {
    /// The file name carries no datetime token to correlate on.
    #[error("no datetime token in file name")]
    NoToken,

    #[error("no identical backup file shares the token '{token}'")]
    NoMatch { token: String },

    #[error("{} identical backup files share the token '{token}'", .candidates.len())]
    Ambiguous {
        token: String,
        candidates: Vec<PathBuf>,
    },

    #[error(transparent)]
    Io(#[from] Error),
}

/// Finds the single backup file that is byte-identical to `primary` and sits in
/// the same relative directory under a name starting with the same token.
///
/// Ambiguity is always reported, never resolved.
pub fn find_unique_match<'a, I>(
    comparator: &Comparator,
    primary: &FileRecord,
    backup_files: I,
) -> Result<&'a FileRecord, MatchError>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let token = primary
        .file_name()
        .and_then(naming_token)
        .ok_or(MatchError::NoToken)?;

    let parent = primary.relative_parent();
    let candidates: Vec<&FileRecord> = backup_files
        .into_iter()
        .filter(|backup| backup.relative_parent() == parent)
        .filter(|backup| backup.file_name().is_some_and(|name| name.starts_with(token)))
        .collect();
    debug!(
        "{} candidates for {} with token '{}'",
        candidates.len(),
        primary.relative.display(),
        token
    );

    let mut identical = Vec::new();
    for candidate in candidates {
        if comparator.identical(primary, candidate, Tier::StrongHash)? {
            identical.push(candidate);
        }
    }

    match identical.len() {
        0 => Err(MatchError::NoMatch {
            token: token.to_string(),
        }),
        1 => Ok(identical[0]),
        _ => Err(MatchError::Ambiguous {
            token: token.to_string(),
            candidates: identical.iter().map(|c| c.relative.clone()).collect(),
        }),
    }
}
