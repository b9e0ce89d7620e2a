use chrono::Duration;
use cohortex_types::{EndpointExpr, EventBounds, TemporalBounds, RECORD_END_COLUMN, RECORD_START_COLUMN};
use tracing::warn;

use crate::duration::parse_duration;
use crate::error::{Error, Result};

/// One endpoint of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Start => "start",
            Endpoint::End => "end",
        }
    }

    pub fn other(&self) -> Endpoint {
        match self {
            Endpoint::Start => Endpoint::End,
            Endpoint::End => Endpoint::Start,
        }
    }
}

/// Inclusive count bounds for one per-window predicate constraint.
/// An absent side is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountBounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl CountBounds {
    /// Parse the `"(min, max)"` constraint string form; either side may be
    /// `None` or empty.
    pub fn parse(raw: &str) -> Result<Self> {
        let inner = raw.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = inner.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return Err(Error::Config(format!(
                "invalid constraint format '{}'; expected '(min, max)'",
                raw
            )));
        }
        let parse_side = |s: &str| -> Result<Option<i64>> {
            if s.is_empty() || s == "None" || s == "null" || s == "~" {
                Ok(None)
            } else {
                s.parse::<i64>().map(Some).map_err(|_| {
                    Error::Config(format!(
                        "invalid constraint bound '{}' in '{}'; expected an integer or None",
                        s, raw
                    ))
                })
            }
        };
        Ok(Self {
            min: parse_side(parts[0])?,
            max: parse_side(parts[1])?,
        })
    }
}

/// The external anchor a window's root endpoint is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowRef {
    /// A bare event name; must resolve to the trigger.
    Event(String),
    /// Another window's start or end.
    WindowEvent { window: String, endpoint: Endpoint },
}

/// A parsed window boundary expression:
/// `REF | REF ± DURATION | REF -> PRED | REF <- PRED`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedBoundary {
    pub referenced: String,
    pub offset: Option<Duration>,
    pub event_bound: Option<String>,
    pub occurs_before: Option<bool>,
}

impl ParsedBoundary {
    fn plain(referenced: &str) -> Self {
        Self {
            referenced: referenced.to_string(),
            offset: None,
            event_bound: None,
            occurs_before: None,
        }
    }
}

fn check_reference(reference: &str) -> Result<()> {
    let err = || {
        Error::Config(format!(
            "window boundary reference must be either a valid alphanumeric/'_' string or a \
             reference to another window's start or end event, formatted as a valid \
             alphanumeric/'_' string followed by '.start' or '.end'; got: '{}'",
            reference
        ))
    };

    let name_re = regex::Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex");
    if let Some((window, event)) = reference.split_once('.') {
        if event.contains('.') || !matches!(event, "start" | "end") || !name_re.is_match(window) {
            return Err(err());
        }
    } else if !name_re.is_match(reference) {
        return Err(err());
    }
    Ok(())
}

fn parse_boundary(boundary: &str) -> Result<ParsedBoundary> {
    if boundary.contains("->") || boundary.contains("<-") {
        if boundary.contains("->") && boundary.contains("<-") {
            return Err(Error::Config(format!(
                "window boundary '{}' cannot contain both '->' and '<-' operators",
                boundary
            )));
        }
        let (reference, predicate) = match boundary.split_once("->") {
            Some((lhs, rhs)) => (lhs.trim(), rhs.trim().to_string()),
            None => match boundary.split_once("<-") {
                Some((lhs, rhs)) => (lhs.trim(), format!("-{}", rhs.trim())),
                None => unreachable!("one operator is present"),
            },
        };
        check_reference(reference)?;
        let occurs_before = predicate.starts_with('-');
        return Ok(ParsedBoundary {
            referenced: reference.to_string(),
            offset: None,
            event_bound: Some(predicate),
            occurs_before: Some(occurs_before),
        });
    }

    if boundary.contains('+') || boundary.contains('-') {
        if boundary.contains('+') && boundary.contains('-') {
            return Err(Error::Config(format!(
                "window boundary '{}' cannot contain both '+' and '-' operators",
                boundary
            )));
        }
        let negated = boundary.contains('-');
        let Some((reference, offset_str)) =
            boundary.split_once(if negated { '-' } else { '+' })
        else {
            unreachable!("one operator is present");
        };
        let (reference, offset_str) = (reference.trim(), offset_str.trim());
        check_reference(reference)?;

        let magnitude = parse_duration(offset_str).map_err(|e| {
            Error::Config(format!(
                "failed to parse duration from window offset '{}': {}",
                offset_str, e
            ))
        })?;
        if magnitude == Duration::zero() {
            warn!(boundary, "window offset is zero; dropping the offset component");
            return Ok(ParsedBoundary::plain(reference));
        }
        let offset = if negated { -magnitude } else { magnitude };
        return Ok(ParsedBoundary {
            referenced: reference.to_string(),
            offset: Some(offset),
            event_bound: None,
            occurs_before: Some(negated),
        });
    }

    let reference = boundary.trim();
    check_reference(reference)?;
    Ok(ParsedBoundary::plain(reference))
}

/// One configured window: two boundary expressions, inclusivity flags, count
/// constraints, and the optional label / index-timestamp declarations.
///
/// Exactly one boundary references the other; the referencing relation
/// determines the window's root endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub start: Option<String>,
    pub end: Option<String>,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
    pub has: Vec<(String, CountBounds)>,
    pub label: Option<String>,
    pub index_timestamp: Option<Endpoint>,
    parsed_start: ParsedBoundary,
    parsed_end: ParsedBoundary,
    start_references_end: bool,
}

impl WindowSpec {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start: Option<String>,
        end: Option<String>,
        start_inclusive: bool,
        end_inclusive: bool,
        has: Vec<(String, String)>,
        label: Option<String>,
        index_timestamp: Option<String>,
    ) -> Result<Self> {
        let has = has
            .into_iter()
            .map(|(name, raw)| CountBounds::parse(&raw).map(|b| (name, b)))
            .collect::<Result<Vec<_>>>()?;

        let index_timestamp = match index_timestamp.as_deref() {
            None => None,
            Some("start") => Some(Endpoint::Start),
            Some("end") => Some(Endpoint::End),
            Some(other) => {
                return Err(Error::Config(format!(
                    "index timestamp must be either 'start' or 'end'; got: '{}'",
                    other
                )));
            }
        };

        if start.is_none() && end.is_none() {
            return Err(Error::Config(
                "window cannot progress from the start of the record to the end of the record"
                    .to_string(),
            ));
        }

        // An absent boundary anchors the window at the record start/end.
        let parsed_start = match &start {
            Some(boundary) => parse_boundary(boundary)?,
            None => ParsedBoundary {
                referenced: "end".to_string(),
                offset: None,
                event_bound: Some(format!("-{}", RECORD_START_COLUMN)),
                occurs_before: Some(true),
            },
        };
        let parsed_end = match &end {
            Some(boundary) => parse_boundary(boundary)?,
            None => ParsedBoundary {
                referenced: "start".to_string(),
                offset: None,
                event_bound: Some(RECORD_END_COLUMN.to_string()),
                occurs_before: Some(false),
            },
        };

        let start_references_end = match (
            parsed_start.referenced == "end",
            parsed_end.referenced == "start",
        ) {
            (true, true) | (false, false) => {
                return Err(Error::Config(format!(
                    "exactly one of the start or end of the window must reference the other; \
                     got: '{:?}' -> '{:?}'",
                    start, end
                )));
            }
            (true, false) => {
                if parsed_start.occurs_before == Some(false) {
                    return Err(Error::Ordering(format!(
                        "window start will not occur before window end; got: '{:?}' -> '{:?}'",
                        start, end
                    )));
                }
                true
            }
            (false, true) => {
                if parsed_end.occurs_before == Some(true) {
                    return Err(Error::Ordering(format!(
                        "window start will not occur before window end; got: '{:?}' -> '{:?}'",
                        start, end
                    )));
                }
                false
            }
        };

        Ok(Self {
            start,
            end,
            start_inclusive,
            end_inclusive,
            has,
            label,
            index_timestamp,
            parsed_start,
            parsed_end,
            start_references_end,
        })
    }

    /// The endpoint defined first: the one anchored outside this window.
    pub fn root_node(&self) -> Endpoint {
        if self.start_references_end {
            Endpoint::End
        } else {
            Endpoint::Start
        }
    }

    /// The external anchor the root endpoint is attached to.
    pub fn referenced_event(&self) -> Result<WindowRef> {
        let referenced = if self.start_references_end {
            &self.parsed_end.referenced
        } else {
            &self.parsed_start.referenced
        };
        match referenced.split_once('.') {
            None => Ok(WindowRef::Event(referenced.clone())),
            Some((window, "start")) => Ok(WindowRef::WindowEvent {
                window: window.to_string(),
                endpoint: Endpoint::Start,
            }),
            Some((window, "end")) => Ok(WindowRef::WindowEvent {
                window: window.to_string(),
                endpoint: Endpoint::End,
            }),
            Some((window, other)) => Err(Error::Config(format!(
                "window boundary references undefined event '{}' for window '{}'; allowed \
                 events: 'start', 'end'",
                other, window
            ))),
        }
    }

    /// Predicate names this window's constraints refer to.
    pub fn constraint_predicates(&self) -> impl Iterator<Item = &str> {
        self.has.iter().map(|(name, _)| name.as_str())
    }

    /// All predicate names this window refers to, through constraints or
    /// event bounds, excluding the reserved record markers.
    pub fn referenced_predicates(&self) -> Vec<String> {
        let mut names: Vec<String> = self.has.iter().map(|(name, _)| name.clone()).collect();
        for parsed in [&self.parsed_start, &self.parsed_end] {
            if let Some(event) = &parsed.event_bound {
                names.push(event.trim_start_matches('-').to_string());
            }
        }
        names.retain(|n| n != RECORD_START_COLUMN && n != RECORD_END_COLUMN);
        names.sort();
        names.dedup();
        names
    }

    pub fn endpoint_expr(&self, endpoint: Endpoint) -> Result<Option<EndpointExpr>> {
        // The root endpoint bounds the unconstrained window back to its
        // external anchor, so its inclusivity flags do not matter; the other
        // endpoint carries this window's configured flags.
        let (parsed, is_root) = match endpoint {
            Endpoint::Start => (&self.parsed_start, !self.start_references_end),
            Endpoint::End => (&self.parsed_end, self.start_references_end),
        };
        let (left_inclusive, right_inclusive) = if is_root {
            (false, false)
        } else {
            (self.start_inclusive, self.end_inclusive)
        };

        if let Some(event) = &parsed.event_bound {
            let bounds = EventBounds::new(left_inclusive, event.clone(), right_inclusive)?;
            return Ok(Some(EndpointExpr::Event(bounds)));
        }
        if let Some(offset) = parsed.offset {
            let bounds = TemporalBounds::new(left_inclusive, offset, right_inclusive);
            return Ok(Some(EndpointExpr::Temporal(bounds)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: Option<&str>, end: Option<&str>) -> Result<WindowSpec> {
        WindowSpec::new(
            start.map(String::from),
            end.map(String::from),
            true,
            true,
            Vec::new(),
            None,
            None,
        )
    }

    #[test]
    fn test_temporal_end_boundary() {
        let spec = window(Some("trigger"), Some("start + 24h")).unwrap();
        assert_eq!(spec.root_node(), Endpoint::Start);
        assert_eq!(
            spec.referenced_event().unwrap(),
            WindowRef::Event("trigger".to_string())
        );
        match spec.endpoint_expr(Endpoint::End).unwrap() {
            Some(EndpointExpr::Temporal(bounds)) => {
                assert_eq!(bounds.window_size, Duration::hours(24));
                assert!(bounds.left_inclusive && bounds.right_inclusive);
            }
            other => panic!("expected temporal bounds, got {:?}", other),
        }
        // The root endpoint collapses to an identity.
        assert!(spec.endpoint_expr(Endpoint::Start).unwrap().is_none());
    }

    #[test]
    fn test_event_bound_boundary() {
        let spec = window(Some("gap.end"), Some("start -> discharge")).unwrap();
        assert_eq!(spec.root_node(), Endpoint::Start);
        assert_eq!(
            spec.referenced_event().unwrap(),
            WindowRef::WindowEvent {
                window: "gap".to_string(),
                endpoint: Endpoint::End
            }
        );
        match spec.endpoint_expr(Endpoint::End).unwrap() {
            Some(EndpointExpr::Event(bounds)) => {
                assert_eq!(bounds.end_event, "discharge");
            }
            other => panic!("expected event bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_backward_event_bound() {
        let spec = window(Some("end <- admission"), Some("trigger")).unwrap();
        assert_eq!(spec.root_node(), Endpoint::End);
        match spec.endpoint_expr(Endpoint::Start).unwrap() {
            Some(EndpointExpr::Event(bounds)) => {
                assert_eq!(bounds.end_event, "-admission");
            }
            other => panic!("expected event bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_null_start_anchors_at_record_start() {
        let spec = window(None, Some("trigger + 24h")).unwrap();
        assert_eq!(spec.root_node(), Endpoint::End);
        match spec.endpoint_expr(Endpoint::Start).unwrap() {
            Some(EndpointExpr::Event(bounds)) => {
                assert_eq!(bounds.end_event, "-_RECORD_START");
                assert!(bounds.left_inclusive && bounds.right_inclusive);
            }
            other => panic!("expected event bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_both_or_neither_referencing() {
        assert!(window(Some("end - 24h"), Some("start + 24h")).is_err());
        assert!(window(Some("trigger"), Some("gap.end + 24h")).is_err());
        assert!(window(None, None).is_err());
    }

    #[test]
    fn test_rejects_reversed_ordering() {
        // start defined after end, or end defined before start
        assert!(matches!(
            window(Some("end + 24h"), Some("trigger")),
            Err(Error::Ordering(_))
        ));
        assert!(matches!(
            window(Some("trigger"), Some("start - 24h")),
            Err(Error::Ordering(_))
        ));
    }

    #[test]
    fn test_rejects_mixed_operators() {
        assert!(window(Some("trigger"), Some("start + 24h - 2h")).is_err());
        assert!(window(Some("trigger"), Some("start -> a <- b")).is_err());
    }

    #[test]
    fn test_zero_offset_collapses_to_reference() {
        let spec = window(Some("trigger + 0 seconds"), Some("start + 24h")).unwrap();
        assert!(spec.endpoint_expr(Endpoint::Start).unwrap().is_none());
    }

    #[test]
    fn test_count_bounds_parse() {
        assert_eq!(
            CountBounds::parse("(5, None)").unwrap(),
            CountBounds { min: Some(5), max: None }
        );
        assert_eq!(
            CountBounds::parse("(None, 0)").unwrap(),
            CountBounds { min: None, max: Some(0) }
        );
        assert_eq!(
            CountBounds::parse("(1, 10)").unwrap(),
            CountBounds { min: Some(1), max: Some(10) }
        );
        assert!(CountBounds::parse("(1)").is_err());
        assert!(CountBounds::parse("(a, b)").is_err());
    }
}
