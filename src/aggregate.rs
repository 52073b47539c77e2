use crate::classify::WorkType;
use crate::filter::NoiseFilter;
use crate::model::{Commit, FileChange, RawCommit};

/// Turns an extracted commit into its reported form, dropping noise paths
/// before anything is summed. A commit left with no files is still returned.
pub fn aggregate(raw: RawCommit, filter: &NoiseFilter) -> Commit {
    Commit {
        id: raw.id,
        full_id: raw.full_id,
        author: raw.author,
        author_email: raw.author_email,
        timestamp: raw.timestamp,
        work_type: WorkType::classify(&raw.subject),
        subject: raw.subject,
        files: retain_signal(raw.files, filter),
    }
}

/// Renames are judged by their destination path.
pub fn retain_signal(files: Vec<FileChange>, filter: &NoiseFilter) -> Vec<FileChange> {
    files
        .into_iter()
        .filter(|change| !filter.is_noise(&change.path))
        .collect()
}
