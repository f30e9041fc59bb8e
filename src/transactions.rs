use std::{fs, marker::PhantomData, path::PathBuf};

/// Enum of possible operations to rollback
pub enum RollbackOperation {
    RemoveFile(PathBuf),
    RemoveDir(PathBuf),
    /// Moves a directory that was set aside back to where it came from.
    Restore { from: PathBuf, to: PathBuf },
}
/// Active Transaction
pub struct Active;
/// Committed Transaction
pub struct Committed;
/// A trait that tells us if rollback should occur when dropped.
pub trait TransactionState {
    const SHOULD_ROLLBACK: bool;
}
impl TransactionState for Active {
    const SHOULD_ROLLBACK: bool = true;
}
impl TransactionState for Committed {
    const SHOULD_ROLLBACK: bool = false;
}
/// Represents a transactional context that tracks rollback operations.
///
/// The state parameter decides what happens on drop: an `Active` transaction
/// undoes its registered operations in reverse order, a `Committed` one does
/// nothing. Returning early with `?` while a transaction is active
/// therefore rolls back everything registered so far.
///
/// # Example
///
/// ```rust
/// use dsp_pynq::transactions::{Active, RollbackOperation, Transaction};
///
/// let mut trx = Transaction::<Active>::new();
/// trx.add_operation(RollbackOperation::RemoveFile("some/path".into()));
/// trx.commit(); // No rollback will happen
/// ```
pub struct Transaction<State: TransactionState> {
    rollback_operations: Vec<RollbackOperation>,
    state: PhantomData<State>,
}
impl Transaction<Active> {
    pub fn new() -> Self {
        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
    /// Registers an action to undo if the transaction is dropped without being committed.
    pub fn add_operation(&mut self, operation: RollbackOperation) {
        self.rollback_operations.push(operation);
    }
    /// Finalizes the transaction, preventing any rollback from occurring.
    pub fn commit(mut self) -> Transaction<Committed> {
        self.rollback_operations.clear();

        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
}
impl<S: TransactionState> Drop for Transaction<S> {
    fn drop(&mut self) {
        if S::SHOULD_ROLLBACK && !self.rollback_operations.is_empty() {
            log::debug!("rolling back operations");
            while let Some(operation) = self.rollback_operations.pop() {
                match operation {
                    RollbackOperation::RemoveDir(path) => {
                        log::debug!("removing dir: {}", path.display());
                        let _ = fs::remove_dir_all(&path);
                    }
                    RollbackOperation::RemoveFile(path) => {
                        log::debug!("removing file: {}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                    RollbackOperation::Restore { from, to } => {
                        log::debug!("restoring {} from {}", to.display(), from.display());
                        if let Err(error) = fs::rename(&from, &to) {
                            log::warn!(
                                "unable to restore {} from {}: {}",
                                to.display(),
                                from.display(),
                                error
                            );
                        }
                    }
                }
            }
        } else if !S::SHOULD_ROLLBACK {
            log::debug!("committing transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_drop_active_rolls_back_in_reverse() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("created");
        let file = dir.join("file.txt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&file, "x").unwrap();

        {
            let mut trx = Transaction::<Active>::new();
            trx.add_operation(RollbackOperation::RemoveDir(dir.clone()));
            trx.add_operation(RollbackOperation::RemoveFile(file.clone()));
        }

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RemoveFile(file.clone()));
        drop(trx.commit());

        assert!(file.exists());
    }

    #[test]
    fn test_drop_restores_moved_directory() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("project");
        let aside = temp.path().join("aside");
        fs::create_dir_all(&original).unwrap();
        fs::write(original.join("keep.txt"), "old").unwrap();
        fs::rename(&original, &aside).unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::Restore {
            from: aside.clone(),
            to: original.clone(),
        });
        drop(trx);

        assert!(!aside.exists());
        assert_eq!(fs::read_to_string(original.join("keep.txt")).unwrap(), "old");
    }
}
