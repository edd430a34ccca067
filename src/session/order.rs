//! Order setup: who the packages are for and how many are expected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The order a scanning session fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContext {
    counterparty: String,
    order_number: String,
    planned_quantity: Option<u32>,
}

impl OrderContext {
    /// Builds an order directly; [`OrderForm::submit`] is the validated way.
    pub fn new(
        counterparty: impl Into<String>,
        order_number: impl Into<String>,
        planned_quantity: Option<u32>,
    ) -> Self {
        Self {
            counterparty: counterparty.into(),
            order_number: order_number.into(),
            planned_quantity,
        }
    }

    pub fn counterparty(&self) -> &str {
        &self.counterparty
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    /// Expected number of packages, if the order has one.
    pub fn planned_quantity(&self) -> Option<u32> {
        self.planned_quantity
    }
}

/// Reasons the setup form cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("counterparty is required")]
    MissingCounterparty,
    #[error("order number is required")]
    MissingOrderNumber,
    #[error("planned quantity must be a whole number of at least 1, got {0:?}")]
    InvalidQuantity(String),
    #[error("unknown counterparty: {0}")]
    UnknownCounterparty(String),
}

/// Whether the counterparty is typed freely or picked from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyMode {
    /// Any name; the directory only offers suggestions.
    #[default]
    FreeText,
    /// Must be one of the directory entries.
    FixedChoice,
}

/// Known counterparties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyDirectory {
    names: Vec<String>,
}

impl CounterpartyDirectory {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Entries containing `query`, ignoring case. Empty for an empty query.
    pub fn suggestions(&self, query: &str) -> Vec<&str> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.names
            .iter()
            .filter(|name| name.to_lowercase().contains(&query))
            .map(String::as_str)
            .collect()
    }

    /// Exact entry for `name`.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|entry| entry.as_str() == name)
            .map(String::as_str)
    }
}

/// The setup screen's inputs, as typed.
#[derive(Debug, Clone, Default)]
pub struct OrderForm {
    /// Counterparty name.
    pub counterparty: String,
    /// Order number.
    pub order_number: String,
    /// Planned package count; empty means no plan.
    pub planned_quantity: String,
}

impl OrderForm {
    pub fn new(
        counterparty: impl Into<String>,
        order_number: impl Into<String>,
        planned_quantity: impl Into<String>,
    ) -> Self {
        Self {
            counterparty: counterparty.into(),
            order_number: order_number.into(),
            planned_quantity: planned_quantity.into(),
        }
    }

    /// Whether the start button is enabled.
    pub fn can_start(&self) -> bool {
        !self.counterparty.trim().is_empty() && !self.order_number.trim().is_empty()
    }

    /// Validates the form into an order.
    pub fn submit(
        &self,
        mode: CounterpartyMode,
        directory: &CounterpartyDirectory,
    ) -> Result<OrderContext, SetupError> {
        let counterparty = self.counterparty.trim();
        if counterparty.is_empty() {
            return Err(SetupError::MissingCounterparty);
        }
        let order_number = self.order_number.trim();
        if order_number.is_empty() {
            return Err(SetupError::MissingOrderNumber);
        }
        if mode == CounterpartyMode::FixedChoice && directory.find(counterparty).is_none() {
            return Err(SetupError::UnknownCounterparty(counterparty.to_string()));
        }

        let planned = self.planned_quantity.trim();
        let planned_quantity = if planned.is_empty() {
            None
        } else {
            match planned.parse::<u32>() {
                Ok(n) if n >= 1 => Some(n),
                _ => return Err(SetupError::InvalidQuantity(planned.to_string())),
            }
        };

        Ok(OrderContext::new(counterparty, order_number, planned_quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> CounterpartyDirectory {
        CounterpartyDirectory::new(["Romashka LLC", "Ivanov A.S.", "TorgService LLC", "Logistic Pro LLC"])
    }

    #[test]
    fn test_can_start_needs_both_fields() {
        assert!(!OrderForm::new("", "2024-001234", "").can_start());
        assert!(!OrderForm::new("A", "   ", "").can_start());
        assert!(OrderForm::new("A", "2024-001234", "").can_start());
    }

    #[test]
    fn test_submit_without_plan() {
        let order = OrderForm::new(" A ", "2024-001234", "")
            .submit(CounterpartyMode::FreeText, &directory())
            .unwrap();
        assert_eq!(order.counterparty(), "A");
        assert_eq!(order.order_number(), "2024-001234");
        assert_eq!(order.planned_quantity(), None);
    }

    #[test]
    fn test_submit_with_plan() {
        let order = OrderForm::new("A", "2024-001234", "5")
            .submit(CounterpartyMode::FreeText, &directory())
            .unwrap();
        assert_eq!(order.planned_quantity(), Some(5));
    }

    #[test]
    fn test_invalid_quantities_rejected() {
        for input in ["0", "-3", "abc", "2.5"] {
            let result = OrderForm::new("A", "1", input)
                .submit(CounterpartyMode::FreeText, &directory());
            assert_eq!(result, Err(SetupError::InvalidQuantity(input.to_string())));
        }
    }

    #[test]
    fn test_fixed_choice_requires_known_counterparty() {
        let form = OrderForm::new("Someone Else", "1", "");
        assert!(matches!(
            form.submit(CounterpartyMode::FixedChoice, &directory()),
            Err(SetupError::UnknownCounterparty(_))
        ));

        let form = OrderForm::new("Ivanov A.S.", "1", "");
        assert!(form.submit(CounterpartyMode::FixedChoice, &directory()).is_ok());
    }

    #[test]
    fn test_suggestions_case_insensitive() {
        let directory = directory();
        assert_eq!(
            directory.suggestions("llc"),
            ["Romashka LLC", "TorgService LLC", "Logistic Pro LLC"]
        );
        assert_eq!(directory.suggestions("IVAN"), ["Ivanov A.S."]);
        assert!(directory.suggestions("").is_empty());
        assert!(directory.suggestions("zzz").is_empty());
    }
}
