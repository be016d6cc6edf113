use std::fmt::{self, Display, Formatter};

use tracing::info;

use crate::broker::DeclareError;

/// Verdict for a single queue.
#[derive(Debug)]
pub enum Outcome {
    Created { message_count: u32 },
    Validated { message_count: u32 },
    Failed(DeclareError),
}

/// Aggregate counts for one provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub created: usize,
    pub validated: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn sized(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created { .. } => self.created += 1,
            Outcome::Validated { .. } => self.validated += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// every queue ended up in exactly one bucket
    pub fn accounted(&self) -> bool {
        self.created + self.validated + self.failed == self.total
    }

    pub fn clean(&self) -> bool {
        self.failed == 0
    }

    pub fn emit(&self) {
        info!("**************Results**************");
        info!("Total {} queues.", self.total);
        info!("Created {} queues.", self.created);
        info!("Validated {} queues.", self.validated);
        info!("Failed to create/validate {} queues.", self.failed);
        info!("***********************************");
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "**************Results**************")?;
        writeln!(f, "Total {} queues.", self.total)?;
        writeln!(f, "Created {} queues.", self.created)?;
        writeln!(f, "Validated {} queues.", self.validated)?;
        writeln!(f, "Failed to create/validate {} queues.", self.failed)?;
        write!(f, "***********************************")
    }
}
