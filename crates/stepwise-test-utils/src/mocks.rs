//! Mock implementation of the StepStore trait.

use async_trait::async_trait;
use mockall::mock;
use stepwise_core::{FlowResult, Step, StepStore, StepValue};

mock! {
    pub StepStore {}

    #[async_trait]
    impl StepStore for StepStore {
        async fn load_step(&self, step: &Step) -> FlowResult<StepValue>;
        async fn save_step(&self, step: &Step) -> FlowResult<()>;
    }
}

/// Creates a new mock StepStore that loads nothing and accepts every save.
pub fn create_mock_step_store() -> MockStepStore {
    let mut mock = MockStepStore::new();

    mock.expect_load_step().returning(|_| Ok(None));
    mock.expect_save_step().returning(|_| Ok(()));

    mock
}
