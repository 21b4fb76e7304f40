use std::{
    process::{ExitCode, Termination},
    time::Duration,
};

use tracing::info;

use crate::errors::StencilError;

pub enum MainExit {
    Success(Option<Duration>),
    Error(StencilError),
}

impl Termination for MainExit {
    fn report(self) -> ExitCode {
        match self {
            Self::Success(spent) => {
                if let Some(spent) = spent {
                    info!("Done in {spent:?}");
                }
                ExitCode::SUCCESS
            }
            Self::Error(err) => err.report(),
        }
    }
}

impl MainExit {
    pub fn new(result: Result<(), StencilError>, done: Option<Duration>) -> Self {
        result.map_or_else(MainExit::Error, |()| MainExit::Success(done))
    }
}
