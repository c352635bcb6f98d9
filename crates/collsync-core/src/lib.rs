pub mod config;
pub mod copy;
pub mod error;
pub mod hasher;
pub mod matcher;
pub mod platform;
pub mod progress;
pub mod propagate;
pub mod record;
pub mod scanner;
pub mod session;
pub mod token;

pub use crate::config::AppConfig;
pub use crate::copy::{CopyEngine, CopyOutcome, CopyReport, FileCopier, StdCopier};
pub use crate::error::{CopyError, Error, Result};
pub use crate::hasher::{Comparator, IdentityDigest, Tier};
pub use crate::matcher::{find_unique_match, MatchError};
pub use crate::progress::{ProgressReporter, SilentReporter};
pub use crate::propagate::{RenamePropagator, RenameReport};
pub use crate::record::FileRecord;
pub use crate::scanner::{ScanOptions, ScanOutcome};
pub use crate::session::{RenameOperation, Session, UndoReport};
