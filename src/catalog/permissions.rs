//! Host filesystem permission model.
//!
//! `queryPermission`/`requestPermission` on a `DirectoryHandle` return
//! one of three states; a host UI only needs to show a recovery modal
//! when it sees `Denied` — the engine itself is unaffected until the
//! host returns a valid handle. This crate does not implement a
//! browser-style permission prompt itself — `DirectoryHandle::query_permission`
//! defaults to `Granted` for the `std::fs`-backed handle, since a native
//! process has no per-directory prompt to ask.

/// Which access a caller is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Prompt,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_granted_counts_as_granted() {
        assert!(PermissionStatus::Granted.is_granted());
        assert!(!PermissionStatus::Prompt.is_granted());
        assert!(!PermissionStatus::Denied.is_granted());
    }
}
