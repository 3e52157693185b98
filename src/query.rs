//! Event queries and the schema they are checked against.
//!
//! A query is `"<event>"` or `"<event>.<action>"`:
//!
//! | Query           | Matches                                          |
//! |-----------------|--------------------------------------------------|
//! | `push`          | every `push` event                               |
//! | `issues.opened` | `issues` events whose payload has `"action": "opened"` |
//!
//! Which events and actions exist is not known to hookchain. The host passes
//! a [`Schema`] to [`Composer::with_schema`](crate::Composer::with_schema) and
//! every query is checked against it when the handler tree is built.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::context::Context;
use crate::error::Error;

/// A parsed event query.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Query {
    event: String,
    action: Option<String>,
}

impl Query {
    pub fn event(&self) -> &str { &self.event }
    pub fn action(&self) -> Option<&str> { self.action.as_deref() }

    /// Pure name and field comparison; no schema lookup happens here.
    pub fn matches(&self, ctx: &Context) -> bool {
        if ctx.event_name() != self.event {
            return false;
        }
        match &self.action {
            None => true,
            Some(action) => ctx.action().as_deref() == Some(action.as_str()),
        }
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::InvalidQuery { query: s.to_owned(), reason };

        let (event, action) = match s.split_once('.') {
            None => (s, None),
            Some((event, action)) => (event, Some(action)),
        };
        if event.is_empty() {
            return Err(invalid("empty event name"));
        }
        match action {
            Some("") => Err(invalid("empty action")),
            Some(action) if action.contains('.') => Err(invalid("more than one `.`")),
            _ => Ok(Self { event: event.to_owned(), action: action.map(str::to_owned) }),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Some(action) => write!(f, "{}.{}", self.event, action),
            None => f.write_str(&self.event),
        }
    }
}

// ── EventQueries ──────────────────────────────────────────────────────────────

/// One query or a set of them; a set matches when any member does.
pub trait EventQueries {
    fn into_queries(self) -> Result<Vec<Query>, Error>;
}

impl EventQueries for &str {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        Ok(vec![self.parse()?])
    }
}

impl EventQueries for String {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        self.as_str().into_queries()
    }
}

impl EventQueries for Query {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        Ok(vec![self])
    }
}

impl EventQueries for &[&str] {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        self.iter().map(|q| q.parse::<Query>()).collect()
    }
}

impl<const N: usize> EventQueries for [&str; N] {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        self.as_slice().into_queries()
    }
}

impl EventQueries for Vec<&str> {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        self.as_slice().into_queries()
    }
}

impl EventQueries for Vec<String> {
    fn into_queries(self) -> Result<Vec<Query>, Error> {
        self.iter().map(|q| q.parse::<Query>()).collect()
    }
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// The closed set of event names and the actions each one carries.
///
/// ```rust
/// use hookchain::Schema;
///
/// let schema = Schema::new()
///     .event("push", [] as [&str; 0])
///     .event("issues", ["opened", "closed"]);
///
/// let same = Schema::from_json(r#"{ "push": [], "issues": ["opened", "closed"] }"#).unwrap();
/// assert_eq!(schema, same);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct Schema {
    events: HashMap<String, HashSet<String>>,
}

impl Schema {
    pub fn new() -> Self { Self::default() }

    /// Registers `name` with its allowed actions. Returns `self` for chaining.
    pub fn event<I, S>(mut self, name: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events
            .entry(name.into())
            .or_default()
            .extend(actions.into_iter().map(Into::into));
        self
    }

    /// Parses a JSON object mapping event names to arrays of action names.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// The allowed actions of `event`, or `None` when the event is unknown.
    pub fn actions(&self, event: &str) -> Option<&HashSet<String>> {
        self.events.get(event)
    }

    pub fn validate(&self, query: &Query) -> Result<(), Error> {
        let actions = self.actions(&query.event).ok_or_else(|| Error::UnknownEvent {
            query: query.to_string(),
            event: query.event.clone(),
        })?;
        match &query.action {
            Some(action) if !actions.contains(action) => Err(Error::UnknownAction {
                query: query.to_string(),
                event: query.event.clone(),
                action: action.clone(),
            }),
            _ => Ok(()),
        }
    }
}
