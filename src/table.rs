//! Table-driven specs
//!
//! [`describe_table`] turns one body and a list of [`Entry`] values into a
//! container with one `It` per entry. Entry parameters travel as a JSON
//! array and are decoded into the body's parameter type while the tree is
//! built. A decode failure is not a build error: the generated `It` fails
//! when it runs, at the entry's declaration site.
//!
//! ```ignore
//! suite.push_node(describe_table(
//!     "addition",
//!     |(a, b, sum): (i32, i32, i32)| {
//!         if a + b != sum {
//!             fail(format!("{a} + {b} != {sum}"));
//!         }
//!     },
//!     vec![entry!("small", 1, 2, 3), entry!("negative", -1, -2, -3).focused()],
//! ))?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::context::fail_at;
use crate::errors::ParameterError;
use crate::models::{CodeLocation, Node};

const BODY_KIND: &str = "Table Body function";
const DESCRIPTION_KIND: &str = "Entry Description function";

/// Text of an entry, either literal or computed from its parameters
pub enum EntryDescription<P> {
    Text(String),
    Generated(Arc<dyn Fn(&P) -> String + Send + Sync>),
}

impl<P> EntryDescription<P> {
    pub fn generated(f: impl Fn(&P) -> String + Send + Sync + 'static) -> Self {
        EntryDescription::Generated(Arc::new(f))
    }
}

impl<P> Clone for EntryDescription<P> {
    fn clone(&self) -> Self {
        match self {
            EntryDescription::Text(text) => EntryDescription::Text(text.clone()),
            EntryDescription::Generated(f) => EntryDescription::Generated(Arc::clone(f)),
        }
    }
}

impl<P> fmt::Debug for EntryDescription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDescription::Text(text) => f.debug_tuple("Text").field(text).finish(),
            EntryDescription::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl<P> From<&str> for EntryDescription<P> {
    fn from(text: &str) -> Self {
        EntryDescription::Text(text.to_string())
    }
}

impl<P> From<String> for EntryDescription<P> {
    fn from(text: String) -> Self {
        EntryDescription::Text(text)
    }
}

/// One row of a table
#[derive(Clone, Debug)]
pub struct Entry<P> {
    pub description: EntryDescription<P>,
    /// JSON array of the row's parameters
    pub params: Value,
    pub location: CodeLocation,
    pub focused: bool,
    pub pending: bool,
}

impl<P> Entry<P> {
    #[track_caller]
    pub fn new(description: impl Into<EntryDescription<P>>, params: Vec<Value>) -> Self {
        Self {
            description: description.into(),
            params: Value::Array(params),
            location: CodeLocation::caller(),
            focused: false,
            pending: false,
        }
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    pub fn pending(mut self) -> Self {
        self.pending = true;
        self
    }
}

/// Serialize one parameter for [`entry!`]. Values that cannot be
/// serialized become `null` and fail to decode later.
pub fn param<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Build an [`Entry`] from a description and any number of parameters
#[macro_export]
macro_rules! entry {
    ($description:expr $(, $param:expr)* $(,)?) => {
        $crate::table::Entry::new(
            $description,
            vec![$($crate::table::param(&$param)),*],
        )
    };
}

/// A container running `body` once per entry
#[track_caller]
pub fn describe_table<P>(
    text: impl Into<String>,
    body: impl Fn(P) + Send + Sync + 'static,
    entries: Vec<Entry<P>>,
) -> Node
where
    P: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let body: Arc<dyn Fn(P) + Send + Sync> = Arc::new(body);
    let entries = Arc::new(entries);

    Node::container(text, move |suite| {
        for entry in entries.iter() {
            let (description, it) = match resolve(entry) {
                Ok((description, params)) => {
                    let body = Arc::clone(&body);
                    let it = Node::it(description.clone(), move || body(params.clone()));
                    (description, it)
                }
                Err((description, err)) => {
                    debug!("Table entry at {} is invalid: {}", entry.location, err);
                    let location = entry.location.clone();
                    let message = err.to_string();
                    let it = Node::it(description.clone(), move || {
                        fail_at(message.clone(), location.clone());
                    });
                    (description, it)
                }
            };
            debug!("Registering table entry {:?}", description);

            let mut it = it.at(entry.location.clone());
            if entry.focused {
                it = it.focused();
            }
            if entry.pending {
                it = it.pending();
            }
            suite.push_node(it)?;
        }
        Ok(())
    })
}

/// Decode an entry's parameters and compute its description. On error the
/// description is whatever could be resolved.
fn resolve<P: DeserializeOwned>(
    entry: &Entry<P>,
) -> Result<(String, P), (String, ParameterError)> {
    let incorrect = |kind: &str, err: serde_json::Error| ParameterError::IncorrectParameters {
        kind: kind.to_string(),
        location: entry.location.clone(),
        reason: err.to_string(),
    };

    match &entry.description {
        EntryDescription::Text(text) => match decode(&entry.params) {
            Ok(params) => Ok((text.clone(), params)),
            Err(err) => Err((text.clone(), incorrect(BODY_KIND, err))),
        },
        EntryDescription::Generated(describe) => match decode(&entry.params) {
            Ok(params) => Ok((describe(&params), params)),
            Err(err) => Err((String::new(), incorrect(DESCRIPTION_KIND, err))),
        },
    }
}

/// A single-element array may stand for the value itself
fn decode<P: DeserializeOwned>(params: &Value) -> Result<P, serde_json::Error> {
    if let Value::Array(items) = params {
        if let [single] = items.as_slice() {
            if let Ok(decoded) = P::deserialize(single) {
                return Ok(decoded);
            }
        }
    }
    P::deserialize(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteConfig;
    use crate::context::fail;
    use crate::models::{NodeType, Report, SpecReport, SpecState};
    use crate::output::Reporter;
    use crate::suite::{RunContext, Suite};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Specs(Vec<SpecReport>);

    impl Reporter for Specs {
        fn suite_will_begin(&mut self, _report: &Report) {}
        fn will_run(&mut self, _report: &SpecReport) {}
        fn did_run(&mut self, report: &SpecReport) {
            if report.leaf_node_type == NodeType::It {
                self.0.push(report.clone());
            }
        }
        fn suite_did_end(&mut self, _report: &Report) {}
    }

    async fn run_table(table: Node) -> Specs {
        let mut suite = Suite::new();
        suite.push_node(table).unwrap();
        suite.build_tree().unwrap();
        let mut specs = Specs::default();
        suite
            .run("tables", "/specs/tables", &mut specs, RunContext::new(), SuiteConfig::default())
            .await
            .unwrap();
        specs
    }

    #[test]
    fn test_decode_tuple_and_single_values() {
        let pair: (i32, String) = decode(&serde_json::json!([1, "a"])).unwrap();
        assert_eq!(pair, (1, "a".to_string()));

        let single: u8 = decode(&serde_json::json!([7])).unwrap();
        assert_eq!(single, 7);

        let list: Vec<i32> = decode(&serde_json::json!([[1, 2]])).unwrap();
        assert_eq!(list, vec![1, 2]);

        assert!(decode::<(i32, i32)>(&serde_json::json!([1])).is_err());
        assert!(decode::<(i32, i32)>(&serde_json::json!([1, 2, 3])).is_err());
        assert!(decode::<(i32, i32)>(&serde_json::json!(["1", 2])).is_err());
    }

    #[test]
    fn test_entry_macro_records_params_and_location() {
        let line = line!() + 1;
        let entry: Entry<(i32, bool)> = entry!("row", 3, true).pending();
        assert_eq!(entry.params, serde_json::json!([3, true]));
        assert_eq!(entry.location.line_number, line);
        assert!(entry.pending);
        assert!(!entry.focused);
    }

    #[tokio::test]
    async fn test_one_spec_per_entry() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let specs = run_table(describe_table(
            "addition",
            move |(a, b, sum): (i32, i32, i32)| {
                sink.lock().push(sum);
                if a + b != sum {
                    fail(format!("{a} + {b} != {sum}"));
                }
            },
            vec![
                entry!("small", 1, 2, 3),
                entry!("wrong", 2, 2, 5),
                Entry::new(
                    EntryDescription::generated(|(a, b, _): &(i32, i32, i32)| format!("{a} and {b}")),
                    vec![param(&10), param(&20), param(&30)],
                ),
            ],
        ))
        .await;

        let texts: Vec<_> = specs.0.iter().map(|r| r.leaf_node_text.as_str()).collect();
        assert_eq!(texts, vec!["small", "wrong", "10 and 20"]);
        let states: Vec<_> = specs.0.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![SpecState::Passed, SpecState::Failed, SpecState::Passed]
        );
        assert_eq!(specs.0[1].failure.message, "2 + 2 != 5");
        assert_eq!(specs.0[0].container_hierarchy_texts, vec!["addition"]);
        assert_eq!(*seen.lock(), vec![3, 5, 30]);
    }

    #[tokio::test]
    async fn test_wrong_parameters_fail_at_the_entry() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let line = line!() + 5;
        let specs = run_table(describe_table(
            "pairs",
            move |(_a, _b): (i32, i32)| *counter.lock() += 1,
            vec![
                entry!("too few", 1),
                entry!("fine", 1, 2),
            ],
        ))
        .await;

        let too_few = &specs.0[0];
        assert_eq!(too_few.leaf_node_text, "too few");
        assert_eq!(too_few.leaf_node_location.line_number, line);
        assert_eq!(too_few.state, SpecState::Failed);
        assert!(too_few.failure.message.contains(BODY_KIND));
        assert_eq!(too_few.failure.location.line_number, line);

        assert_eq!(specs.0[1].state, SpecState::Passed);
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_generated_description_failure() {
        let specs = run_table(describe_table(
            "generated",
            |_: (i32, i32)| {},
            vec![Entry::new(
                EntryDescription::generated(|(a, b): &(i32, i32)| format!("{a}/{b}")),
                vec![param(&"not a number"), param(&1)],
            )],
        ))
        .await;

        let report = &specs.0[0];
        assert_eq!(report.leaf_node_text, "");
        assert_eq!(report.state, SpecState::Failed);
        assert!(report.failure.message.contains(DESCRIPTION_KIND));
    }

    #[tokio::test]
    async fn test_entry_decorations() {
        let specs = run_table(describe_table(
            "decorated",
            |_: u8| {},
            vec![entry!("skipped", 1), entry!("todo", 2).pending(), entry!("only", 3).focused()],
        ))
        .await;

        let states: Vec<_> = specs.0.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![SpecState::Skipped, SpecState::Pending, SpecState::Passed]
        );
    }
}
