use crate::{grade::Grade, resilient::ResilientInvoker};

/// One prompt and the slot its grade belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    pub prompt: String,
}

impl Job {
    pub fn new(index: usize, prompt: impl Into<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
        }
    }

    /// Evaluates the prompt; errors are folded into the returned grade.
    pub async fn run(&self, invoker: &ResilientInvoker) -> Grade {
        match invoker.invoke(&self.prompt).await {
            Ok(grade) => grade,
            Err(err) => {
                log::warn!("row {} failed: {err}", self.index);
                Grade::failed(&err)
            }
        }
    }
}
