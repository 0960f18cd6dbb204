//! Stage-and-commit wrapper.
//!
//! An operation that mutates several pieces of state runs against a staged
//! copy; the copy replaces the live state only if the operation returns
//! `Ok`. A failed operation therefore has no observable effect.

/// Run `op` on a copy of `state`, committing the copy on success.
pub fn atomically<S, T, E>(state: &mut S, op: impl FnOnce(&mut S) -> Result<T, E>) -> Result<T, E>
where
    S: Clone,
{
    let mut staged = state.clone();
    let out = op(&mut staged)?;
    *state = staged;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_on_success() {
        let mut v = vec![1, 2];
        let len = atomically(&mut v, |s| {
            s.push(3);
            Ok::<_, ()>(s.len())
        })
        .expect("committed");
        assert_eq!(len, 3);
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn test_discard_on_error() {
        let mut v = vec![1, 2];
        let result: Result<(), &str> = atomically(&mut v, |s| {
            s.push(3);
            s.clear();
            Err("rejected")
        });
        assert_eq!(result, Err("rejected"));
        assert_eq!(v, vec![1, 2]);
    }
}
