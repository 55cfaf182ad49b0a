//! Route template compilation and matching.
//!
//! # Responsibilities
//! - Parse a template (`/api/v:version/users/:id`, `/files/*`) into segments
//! - Rank templates by specificity
//! - Match decoded path segments and capture parameters
//!
//! # Design Decisions
//! - No regex: segments are compared directly, O(segments) per pattern
//! - Deterministic: the same template and options always compile equal
//! - A parameter followed by a literal in the same segment captures the
//!   shortest non-empty run before that literal; no backtracking

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::routing::params::Params;

/// Matching options shared by every pattern in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    /// When set, `/a` and `/a/` are different paths.
    pub strict_trailing_slash: bool,
    /// When unset, literal text is compared ASCII case-insensitively.
    pub case_sensitive: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            strict_trailing_slash: false,
            case_sensitive: true,
        }
    }
}

/// Errors raised while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("template '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("template '{template}' has an empty parameter name in segment {segment}")]
    EmptyParamName { template: String, segment: usize },

    #[error("template '{template}' declares parameter '{name}' twice")]
    DuplicateParam { template: String, name: String },

    #[error("template '{template}' has adjacent parameters in segment {segment}")]
    AdjacentParams { template: String, segment: usize },

    #[error("template '{template}' uses '*' outside a trailing segment")]
    MisplacedWildcard { template: String },
}

/// Rank of one template segment. Higher ranks are more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Wildcard = 0,
    /// Implicit rank of "no segment here"; outranks a wildcard at that depth.
    End = 1,
    Param = 2,
    Mixed = 3,
    Literal = 4,
}

/// Specificity of a compiled template, compared depth by depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specificity(Vec<Rank>);

impl Specificity {
    pub fn ranks(&self) -> &[Rank] {
        &self.0
    }
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        let depth = self.0.len().max(other.0.len());
        for i in 0..depth {
            let a = self.0.get(i).copied().unwrap_or(Rank::End);
            let b = other.0.get(i).copied().unwrap_or(Rank::End);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in &self.0 {
            let c = match rank {
                Rank::Literal => 'L',
                Rank::Mixed => 'M',
                Rank::Param => 'P',
                Rank::End => '$',
                Rank::Wildcard => '*',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Mixed(Vec<Part>),
    Wildcard,
}

impl Segment {
    fn rank(&self) -> Rank {
        match self {
            Segment::Literal(_) => Rank::Literal,
            Segment::Mixed(_) => Rank::Mixed,
            Segment::Param(_) => Rank::Param,
            Segment::Wildcard => Rank::Wildcard,
        }
    }
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
    specificity: Specificity,
    options: PatternOptions,
}

impl RoutePattern {
    /// Compile a template.
    pub fn compile(template: &str, options: PatternOptions) -> Result<Self, PatternError> {
        let body = template
            .strip_prefix('/')
            .ok_or_else(|| PatternError::MissingLeadingSlash(template.to_string()))?;

        let mut raw: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };
        if !options.strict_trailing_slash && raw.last() == Some(&"") {
            raw.pop();
        }

        let mut segments = Vec::with_capacity(raw.len());
        let mut param_names: Vec<String> = Vec::new();
        let last = raw.len().saturating_sub(1);

        for (index, text) in raw.iter().enumerate() {
            if *text == "*" {
                if index != last {
                    return Err(PatternError::MisplacedWildcard {
                        template: template.to_string(),
                    });
                }
                segments.push(Segment::Wildcard);
                continue;
            }
            if text.contains('*') {
                return Err(PatternError::MisplacedWildcard {
                    template: template.to_string(),
                });
            }

            let parts = parse_parts(template, index, text)?;
            for part in &parts {
                if let Part::Param(name) = part {
                    if param_names.contains(name) {
                        return Err(PatternError::DuplicateParam {
                            template: template.to_string(),
                            name: name.clone(),
                        });
                    }
                    param_names.push(name.clone());
                }
            }

            let fold = |s: String| {
                if options.case_sensitive {
                    s
                } else {
                    s.to_ascii_lowercase()
                }
            };
            let segment = match parts.as_slice() {
                [] => Segment::Literal(String::new()),
                [Part::Literal(lit)] => Segment::Literal(fold(lit.clone())),
                [Part::Param(name)] => Segment::Param(name.clone()),
                _ => Segment::Mixed(
                    parts
                        .into_iter()
                        .map(|p| match p {
                            Part::Literal(lit) => Part::Literal(fold(lit)),
                            param => param,
                        })
                        .collect(),
                ),
            };
            segments.push(segment);
        }

        let specificity = Specificity(segments.iter().map(Segment::rank).collect());

        Ok(Self {
            template: template.to_string(),
            segments,
            param_names,
            specificity,
            options,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Named parameters in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    pub fn specificity(&self) -> &Specificity {
        &self.specificity
    }

    /// Match already-decoded path segments (see [`decode_path`]).
    ///
    /// [`decode_path`]: crate::routing::decode::decode_path
    pub fn matches(&self, path: &[String]) -> Option<Params> {
        let path = match path.split_last() {
            Some((last, rest)) if last.is_empty() && !self.options.strict_trailing_slash => rest,
            _ => path,
        };

        let mut params = Params::new();
        for (index, segment) in self.segments.iter().enumerate() {
            if let Segment::Wildcard = segment {
                params.set_wildcard(path[index..].join("/"));
                return Some(params);
            }

            let value = path.get(index)?;
            match segment {
                Segment::Literal(lit) => {
                    if !self.literal_eq(lit, value) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if value.is_empty() {
                        return None;
                    }
                    params.push(name, value.as_str());
                }
                Segment::Mixed(parts) => self.match_mixed(parts, value, &mut params)?,
                Segment::Wildcard => unreachable!("handled above"),
            }
        }

        (path.len() == self.segments.len()).then_some(params)
    }

    fn literal_eq(&self, lit: &str, value: &str) -> bool {
        if self.options.case_sensitive {
            lit == value
        } else {
            lit.eq_ignore_ascii_case(value)
        }
    }

    fn starts_with_literal(&self, haystack: &str, lit: &str) -> bool {
        match haystack.as_bytes().get(..lit.len()) {
            Some(head) if self.options.case_sensitive => head == lit.as_bytes(),
            Some(head) => head.eq_ignore_ascii_case(lit.as_bytes()),
            None => false,
        }
    }

    fn match_mixed(&self, parts: &[Part], value: &str, params: &mut Params) -> Option<()> {
        let mut rest = value;
        let mut iter = parts.iter().peekable();

        while let Some(part) = iter.next() {
            match part {
                Part::Literal(lit) => {
                    if !self.starts_with_literal(rest, lit) {
                        return None;
                    }
                    rest = &rest[lit.len()..];
                }
                Part::Param(name) => match iter.peek() {
                    Some(Part::Literal(next)) => {
                        let end = rest
                            .char_indices()
                            .skip(1)
                            .map(|(i, _)| i)
                            .find(|&i| self.starts_with_literal(&rest[i..], next))?;
                        params.push(name, &rest[..end]);
                        rest = &rest[end..];
                    }
                    _ => {
                        if rest.is_empty() {
                            return None;
                        }
                        params.push(name, rest);
                        rest = "";
                    }
                },
            }
        }

        rest.is_empty().then_some(())
    }
}

/// Split one template segment into literal and `:name` parts.
fn parse_parts(template: &str, segment: usize, text: &str) -> Result<Vec<Part>, PatternError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' {
            literal.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(PatternError::EmptyParamName {
                template: template.to_string(),
                segment,
            });
        }
        if literal.is_empty() && matches!(parts.last(), Some(Part::Param(_))) {
            return Err(PatternError::AdjacentParams {
                template: template.to_string(),
                segment,
            });
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(&mut literal)));
        }
        parts.push(Part::Param(name));
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}
