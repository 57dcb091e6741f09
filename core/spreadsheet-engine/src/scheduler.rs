//! FILENAME: core/spreadsheet-engine/src/scheduler.rs
//! Resumable commands executed one slice per scheduler tick.
//!
//! A command does a bounded amount of work per `execute` call and reports
//! whether it is done. The host decides what happens between ticks (an
//! async host yields to its event loop), so no single call blocks for the
//! whole job.

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick<T> {
    Pending,
    Ready(T),
}

impl<T> Tick<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Tick::Ready(_))
    }
}

pub trait IncrementalCommand<C: ?Sized> {
    type Output;

    fn execute(&mut self, context: &mut C) -> Tick<Self::Output>;
}

/// Runs `command` until it is ready, without yielding in between.
/// Returns the output and the number of ticks taken.
pub fn run_to_completion<C, I>(command: &mut I, context: &mut C) -> (I::Output, usize)
where
    C: ?Sized,
    I: IncrementalCommand<C>,
{
    let mut ticks = 0;
    loop {
        ticks += 1;
        if let Tick::Ready(output) = command.execute(context) {
            return (output, ticks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountDown(u32);

    impl IncrementalCommand<Vec<u32>> for CountDown {
        type Output = usize;

        fn execute(&mut self, seen: &mut Vec<u32>) -> Tick<usize> {
            seen.push(self.0);
            if self.0 == 0 {
                return Tick::Ready(seen.len());
            }
            self.0 -= 1;
            Tick::Pending
        }
    }

    #[test]
    fn test_run_to_completion_counts_ticks() {
        let mut seen = Vec::new();
        let (output, ticks) = run_to_completion(&mut CountDown(3), &mut seen);
        assert_eq!((output, ticks), (4, 4));
        assert_eq!(seen, vec![3, 2, 1, 0]);
    }
}
