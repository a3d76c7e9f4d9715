use smeta::{FileStorage, Intake, RequestStore};

/// Shared handler state. Every field is a cheap clone over shared handles.
#[derive(Clone)]
pub struct AppState {
    pub intake: Intake,
    pub store: RequestStore,
    pub results: FileStorage,
    pub history_limit: usize,
}
