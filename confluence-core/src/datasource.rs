//! The datasource capability.

use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

use crate::state::DatasourceState;

/// Boxed stream of states.
pub type StateStream<S> = BoxStream<'static, S>;

/// Anything that produces a stream of states.
///
/// Each call to [`Datasource::state`] returns a fresh subscription.
pub trait Datasource: Send + Sync {
    type State: DatasourceState;

    /// Subscribe to the state stream.
    fn state(&self) -> StateStream<Self::State>;

    /// Whether [`Datasource::state`] yields a value immediately on subscription.
    fn loads_synchronously(&self) -> bool;

    /// State stream that is guaranteed to start with a value.
    ///
    /// Sources that do not emit on subscription get a leading `NotReady`,
    /// so latest-value combinators can start merging immediately.
    fn state_with_synchronous_initial(&self) -> StateStream<Self::State> {
        if self.loads_synchronously() {
            self.state()
        } else {
            stream::iter(std::iter::once(Self::State::not_ready()))
                .chain(self.state())
                .boxed()
        }
    }
}

impl<D: Datasource + ?Sized> Datasource for Arc<D> {
    type State = D::State;

    fn state(&self) -> StateStream<Self::State> {
        (**self).state()
    }

    fn loads_synchronously(&self) -> bool {
        (**self).loads_synchronously()
    }

    fn state_with_synchronous_initial(&self) -> StateStream<Self::State> {
        (**self).state_with_synchronous_initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasourceError;
    use crate::impulse::LoadImpulse;
    use crate::parameters::DefaultLoadImpulseType;
    use crate::state::State;
    use futures_util::FutureExt;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Error)]
    #[error("never")]
    struct Never;

    impl DatasourceError for Never {}

    type TestState = State<u8, String, DefaultLoadImpulseType, Never>;

    struct FixedDatasource {
        states: Vec<TestState>,
        synchronous: bool,
    }

    impl Datasource for FixedDatasource {
        type State = TestState;

        fn state(&self) -> StateStream<TestState> {
            stream::iter(self.states.clone()).boxed()
        }

        fn loads_synchronously(&self) -> bool {
            self.synchronous
        }
    }

    fn collect(stream: StateStream<TestState>) -> Vec<TestState> {
        stream
            .collect::<Vec<_>>()
            .now_or_never()
            .unwrap_or_default()
    }

    #[test]
    fn test_asynchronous_source_gets_leading_not_ready() {
        let success = TestState::success(1, LoadImpulse::initial("p1".to_string()));
        let source = FixedDatasource {
            states: vec![success.clone()],
            synchronous: false,
        };
        assert_eq!(
            collect(source.state_with_synchronous_initial()),
            vec![TestState::NotReady, success]
        );
    }

    #[test]
    fn test_synchronous_source_is_unchanged() {
        let success = TestState::success(1, LoadImpulse::initial("p1".to_string()));
        let source = Arc::new(FixedDatasource {
            states: vec![success.clone()],
            synchronous: true,
        });
        assert_eq!(collect(source.state_with_synchronous_initial()), vec![success]);
    }
}
