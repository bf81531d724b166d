//! Validation Framework
//!
//! An ordered list of rules, each pairing a predicate with the violation
//! it reports. Evaluation stops at the first predicate that holds, so a
//! request gets exactly one primary diagnostic. Rules are listed cheapest
//! first: field presence, then store lookups, then conflict scans.
//!
//! Predicates may be synchronous ([`Rule::new`]) or need a round trip to
//! the store or the upstream inventory ([`Rule::deferred`]); a deferred
//! predicate that fails propagates its error instead of a violation.

use crate::error::Result;
use crate::redfish::messages::MsgExtendedInfo;
use axum::http::StatusCode;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;

/// A rejected request: the Redfish message plus the HTTP status to answer with
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub info: MsgExtendedInfo,
    pub status: StatusCode,
}

impl Violation {
    pub fn new(info: MsgExtendedInfo, status: StatusCode) -> Self {
        Self { info, status }
    }

    pub fn bad_request(info: MsgExtendedInfo) -> Self {
        Self::new(info, StatusCode::BAD_REQUEST)
    }

    pub fn conflict(info: MsgExtendedInfo) -> Self {
        Self::new(info, StatusCode::CONFLICT)
    }
}

type Predicate<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<bool>> + Send + 'a>;
type ViolationFactory<'a> = Box<dyn FnOnce() -> Violation + Send + 'a>;

/// A single (predicate, violation) pair
///
/// The predicate answers "is this rule violated?".
pub struct Rule<'a> {
    violated: Predicate<'a>,
    on_violation: ViolationFactory<'a>,
}

impl<'a> Rule<'a> {
    /// Rule with a local predicate
    pub fn new<P, V>(violated: P, on_violation: V) -> Self
    where
        P: FnOnce() -> bool + Send + 'a,
        V: FnOnce() -> Violation + Send + 'a,
    {
        Self {
            violated: Box::new(move || futures::future::ready(Ok(violated())).boxed()),
            on_violation: Box::new(on_violation),
        }
    }

    /// Rule whose predicate performs I/O
    pub fn deferred<P, F, V>(violated: P, on_violation: V) -> Self
    where
        P: FnOnce() -> F + Send + 'a,
        F: Future<Output = Result<bool>> + Send + 'a,
        V: FnOnce() -> Violation + Send + 'a,
    {
        Self {
            violated: Box::new(move || violated().boxed()),
            on_violation: Box::new(on_violation),
        }
    }
}

/// Ordered, fail-fast rule set
#[derive(Default)]
pub struct Validator<'a> {
    rules: Vec<Rule<'a>>,
}

impl<'a> Validator<'a> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; rules run in insertion order
    pub fn rule(mut self, rule: Rule<'a>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluate rules in order and return the first violation, if any
    pub async fn validate(self) -> Result<Option<Violation>> {
        for rule in self.rules {
            if (rule.violated)().await? {
                return Ok(Some((rule.on_violation)()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::redfish::messages;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn missing(property: &str) -> Violation {
        Violation::bad_request(messages::property_missing(property, "cannot be empty"))
    }

    #[tokio::test]
    async fn test_no_violation() {
        let result = Validator::new()
            .rule(Rule::new(|| false, || missing("Name")))
            .rule(Rule::deferred(|| async { Ok(false) }, || missing("Links")))
            .validate()
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_first_violation_wins() {
        let result = Validator::new()
            .rule(Rule::new(|| false, || missing("Name")))
            .rule(Rule::new(|| true, || missing("ChassisType")))
            .rule(Rule::new(
                || true,
                || Violation::conflict(messages::resource_in_use("busy")),
            ))
            .validate()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.status, StatusCode::BAD_REQUEST);
        assert_eq!(result.info.message_args[0], "ChassisType");
    }

    #[tokio::test]
    async fn test_rules_after_violation_are_not_evaluated() {
        let evaluated = AtomicBool::new(false);
        let flag = &evaluated;
        let result = Validator::new()
            .rule(Rule::new(|| true, || missing("Name")))
            .rule(Rule::deferred(
                move || async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(true)
                },
                || missing("Links"),
            ))
            .validate()
            .await
            .unwrap();

        assert!(result.is_some());
        assert!(!evaluated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deferred_failure_propagates() {
        let result = Validator::new()
            .rule(Rule::deferred(
                || async { Err(Error::StoreUnavailable("down".into())) },
                || missing("Name"),
            ))
            .validate()
            .await;
        assert_matches!(result, Err(Error::StoreUnavailable(_)));
    }
}
