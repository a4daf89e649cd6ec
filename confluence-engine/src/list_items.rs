//! State to list-items transform for single-section list views.

use confluence_core::{DatasourceState, ProvisioningState};
use serde::{Deserialize, Serialize};

/// Items of a single-section list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "items", rename_all = "snake_case")]
pub enum ListItems<I> {
    /// Nothing to show yet, not even placeholders.
    NotReady,
    ReadyToDisplay(Vec<I>),
}

impl<I> ListItems<I> {
    pub fn items(&self) -> Option<&[I]> {
        match self {
            ListItems::NotReady => None,
            ListItems::ReadyToDisplay(items) => Some(items),
        }
    }
}

type ItemGenerator<I> = Box<dyn Fn() -> I + Send + Sync>;
type ErrorItemGenerator<E, I> = Box<dyn Fn(&E) -> I + Send + Sync>;

/// Turns states into list items.
///
/// Placeholder generators are optional; without one the list is empty in
/// the corresponding situation.
pub struct ItemsTransformer<S: DatasourceState, I> {
    no_results: Option<ItemGenerator<I>>,
    error: Option<ErrorItemGenerator<S::Error, I>>,
    loading: Option<ItemGenerator<I>>,
}

impl<S: DatasourceState, I> Default for ItemsTransformer<S, I> {
    fn default() -> Self {
        Self {
            no_results: None,
            error: None,
            loading: None,
        }
    }
}

impl<S: DatasourceState, I> ItemsTransformer<S, I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Item shown when a value has no items.
    pub fn with_no_results_item(
        mut self,
        generator: impl Fn() -> I + Send + Sync + 'static,
    ) -> Self {
        self.no_results = Some(Box::new(generator));
        self
    }

    /// Item shown for an error without usable fallback items.
    pub fn with_error_item(
        mut self,
        generator: impl Fn(&S::Error) -> I + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Box::new(generator));
        self
    }

    /// Item shown while loading without any value.
    pub fn with_loading_item(
        mut self,
        generator: impl Fn() -> I + Send + Sync + 'static,
    ) -> Self {
        self.loading = Some(Box::new(generator));
        self
    }

    fn placeholder(generator: &Option<ItemGenerator<I>>) -> ListItems<I> {
        ListItems::ReadyToDisplay(generator.iter().map(|generate| generate()).collect())
    }

    /// Items for `state`.
    ///
    /// `value_to_items` returns `None` for values that have no items; they
    /// are shown like an empty list.
    pub fn items<F>(&self, state: &S, value_to_items: F) -> ListItems<I>
    where
        F: Fn(&S::Value) -> Option<Vec<I>>,
    {
        let non_empty = |value: Option<&S::Value>| {
            value
                .and_then(&value_to_items)
                .filter(|items| !items.is_empty())
        };

        match state.provisioning_state() {
            ProvisioningState::NotReady => ListItems::NotReady,
            ProvisioningState::Loading => {
                if let Some(items) = non_empty(state.value()) {
                    ListItems::ReadyToDisplay(items)
                } else if state.value().is_some() {
                    Self::placeholder(&self.no_results)
                } else {
                    Self::placeholder(&self.loading)
                }
            }
            ProvisioningState::Result => {
                if let Some(items) = non_empty(state.value()) {
                    return ListItems::ReadyToDisplay(items);
                }
                match state.error() {
                    Some(error) => ListItems::ReadyToDisplay(
                        self.error.iter().map(|generate| generate(error)).collect(),
                    ),
                    None => Self::placeholder(&self.no_results),
                }
            }
        }
    }
}
