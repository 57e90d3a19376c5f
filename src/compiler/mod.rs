//! Condition-tree compiler
//!
//! One recursive-descent walker lowers a portable `Condition` for every
//! backend. Backends plug in through the `Dialect` trait, which supplies
//! identifier mapping, value conversion, predicate lowering, combinator
//! lowering and final statement assembly. Each level of the walk returns its
//! fragment by value; parameters are appended in traversal order, which is
//! also the order fragments are joined, so placeholders and values line up.

pub mod capabilities;
pub mod params;

use std::fmt;

use tracing::{debug, trace};

use crate::condition::{Condition, Operator};
use crate::config::CompilerConfig;
use crate::entity::Element;
use crate::error::{QueryError, Result};
use crate::query::{CursorToken, Query};
use crate::value::Value;

pub use capabilities::{Capabilities, Negation, Paging};
pub use params::{Binder, ParamStyle, Parameter, parameter_name};

/// Boolean connective joining sibling fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// Entity and field a value belongs to, for conversion errors
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub entity: &'a str,
    pub field: &'a str,
}

impl<'a> Scope<'a> {
    pub fn new(entity: &'a str, field: &'a str) -> Self {
        Self { entity, field }
    }

    /// Same entity, different field
    pub fn nested(&self, field: &'a str) -> Scope<'a> {
        Scope {
            entity: self.entity,
            field,
        }
    }

    pub fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::conversion(self.entity, self.field, message)
    }
}

/// Converted right-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<N> {
    Single(N),
    /// BETWEEN bounds, lower first
    Range(N, N),
    /// IN members, in declared order
    Many(Vec<N>),
}

/// A predicate after shape validation and value conversion
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate<N> {
    pub operator: Operator,
    /// Portable element name, used to derive parameter names
    pub name: String,
    /// Backend field path, already quoted/escaped
    pub path: String,
    pub operand: Operand<N>,
}

/// Output of the condition walk, before statement assembly
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered<F, N> {
    pub filter: Option<F>,
    pub parameters: Vec<Parameter<N>>,
    pub key_lookup: Vec<N>,
}

impl<F, N> Lowered<F, N> {
    pub fn empty() -> Self {
        Self {
            filter: None,
            parameters: Vec::new(),
            key_lookup: Vec::new(),
        }
    }

    /// Wrap an assembled statement together with the lowered parts
    pub fn finish(
        self,
        query: &Query,
        target: impl Into<String>,
        statement: F,
    ) -> NativeStatement<F, N> {
        NativeStatement {
            entity: query.entity().to_string(),
            target: target.into(),
            statement,
            filter: self.filter,
            parameters: self.parameters,
            key_lookup: self.key_lookup,
            fetch_size: None,
            paging_state: None,
        }
    }
}

/// Executable artifact handed to an execution adapter
#[derive(Debug, Clone, PartialEq)]
pub struct NativeStatement<F, N> {
    /// Portable entity name the rows belong to
    pub entity: String,
    /// Native table, collection or index
    pub target: String,
    /// Full native statement (query text or request document)
    pub statement: F,
    /// Lowered predicate alone, without backend-internal predicates
    pub filter: Option<F>,
    pub parameters: Vec<Parameter<N>>,
    /// Primary-key values for a direct fetch; the filter still applies to them
    pub key_lookup: Vec<N>,
    /// Driver page size, for cursor-paginated backends
    pub fetch_size: Option<u64>,
    /// Paging state to resume from, for cursor-paginated backends
    pub paging_state: Option<CursorToken>,
}

impl<F, N> NativeStatement<F, N> {
    pub fn parameter_values(&self) -> Vec<&N> {
        self.parameters.iter().map(|p| &p.value).collect()
    }

    /// Look up a named parameter
    pub fn parameter(&self, name: &str) -> Option<&N> {
        self.parameters
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| &p.value)
    }

    pub fn is_point_lookup(&self) -> bool {
        !self.key_lookup.is_empty()
    }
}

/// Backend-specific lowering strategy
pub trait Dialect: Send + Sync {
    /// Native filter/statement representation
    type Fragment: Clone + fmt::Debug + PartialEq;
    /// Native bound-value type
    type Native: Clone + fmt::Debug + PartialEq;

    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &'static Capabilities;

    fn param_style(&self) -> ParamStyle;

    /// Native path of a portable field name
    fn field(&self, name: &str, config: &CompilerConfig) -> String;

    fn to_native(&self, value: &Value, scope: Scope<'_>) -> Result<Self::Native>;

    fn lower_predicate(
        &self,
        predicate: Predicate<Self::Native>,
        binder: &mut Binder<Self::Native>,
    ) -> Result<Self::Fragment>;

    fn join(&self, connective: Connective, parts: Vec<Self::Fragment>) -> Result<Self::Fragment>;

    fn negate(&self, inner: Self::Fragment) -> Result<Self::Fragment>;

    fn assemble(
        &self,
        query: &Query,
        lowered: Lowered<Self::Fragment, Self::Native>,
        config: &CompilerConfig,
    ) -> Result<NativeStatement<Self::Fragment, Self::Native>>;
}

/// Compiles portable queries for one backend
#[derive(Debug, Clone)]
pub struct Compiler<D> {
    dialect: D,
    config: CompilerConfig,
}

impl<D: Dialect> Compiler<D> {
    pub fn new(dialect: D) -> Self {
        Self::with_config(dialect, CompilerConfig::default())
    }

    pub fn with_config(dialect: D, config: CompilerConfig) -> Self {
        Self { dialect, config }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Lower `query` into the backend's native statement
    pub fn compile(&self, query: &Query) -> Result<NativeStatement<D::Fragment, D::Native>> {
        let backend = self.dialect.name();
        let capabilities = self.dialect.capabilities();

        match capabilities.paging {
            Paging::Cursor if query.skip() > 0 => {
                return Err(QueryError::unsupported(backend, "skip"));
            }
            Paging::Offset if query.cursor().is_some() => {
                return Err(QueryError::unsupported(backend, "cursor"));
            }
            _ => {}
        }

        let lowered = match query.condition() {
            Some(condition) => {
                capabilities.check(backend, condition)?;
                self.lower_root(query.entity(), condition)?
            }
            None => Lowered::empty(),
        };

        let statement = self.dialect.assemble(query, lowered, &self.config)?;
        debug!(
            backend,
            entity = query.entity(),
            parameters = statement.parameters.len(),
            keys = statement.key_lookup.len(),
            "compiled query"
        );
        Ok(statement)
    }

    fn lower_root(
        &self,
        entity: &str,
        condition: &Condition,
    ) -> Result<Lowered<D::Fragment, D::Native>> {
        let mut walker = Walker {
            dialect: &self.dialect,
            config: &self.config,
            entity,
            binder: Binder::new(self.dialect.param_style()),
        };

        let split = if self.dialect.capabilities().point_lookup && self.config.point_lookup {
            split_point_lookup(condition, &self.config.id_field)
        } else {
            None
        };

        let (filter, key_lookup) = match split {
            Some(split) => {
                trace!(entity, field = %self.config.id_field, "diverting ID predicate to key lookup");
                let keys = walker.keys(split.key)?;
                (walker.lower_conjunction(&split.rest)?, keys)
            }
            None => (Some(walker.lower(condition)?), Vec::new()),
        };

        Ok(Lowered {
            filter,
            parameters: walker.binder.into_parameters(),
            key_lookup,
        })
    }
}

struct Walker<'a, D: Dialect> {
    dialect: &'a D,
    config: &'a CompilerConfig,
    entity: &'a str,
    binder: Binder<D::Native>,
}

impl<D: Dialect> Walker<'_, D> {
    fn lower(&mut self, condition: &Condition) -> Result<D::Fragment> {
        match condition {
            Condition::Predicate { operator, element } => {
                let predicate = self.predicate(*operator, element)?;
                self.dialect.lower_predicate(predicate, &mut self.binder)
            }
            Condition::And(children) => self.lower_children(Connective::And, children),
            Condition::Or(children) => self.lower_children(Connective::Or, children),
            Condition::Not(inner) => {
                let inner = self.lower(inner)?;
                self.dialect.negate(inner)
            }
        }
    }

    fn lower_children(
        &mut self,
        connective: Connective,
        children: &[Condition],
    ) -> Result<D::Fragment> {
        if children.is_empty() {
            let name = match connective {
                Connective::And => "AND",
                Connective::Or => "OR",
            };
            return Err(QueryError::invalid(format!(
                "{} requires at least one condition",
                name
            )));
        }
        let parts = children
            .iter()
            .map(|c| self.lower(c))
            .collect::<Result<Vec<_>>>()?;
        self.dialect.join(connective, parts)
    }

    /// Lower the siblings left behind by point-lookup diversion
    fn lower_conjunction(&mut self, rest: &[&Condition]) -> Result<Option<D::Fragment>> {
        match rest {
            [] => Ok(None),
            [single] => self.lower(single).map(Some),
            many => {
                let parts = many
                    .iter()
                    .map(|c| self.lower(c))
                    .collect::<Result<Vec<_>>>()?;
                self.dialect.join(Connective::And, parts).map(Some)
            }
        }
    }

    fn keys(&mut self, condition: &Condition) -> Result<Vec<D::Native>> {
        let Condition::Predicate { operator, element } = condition else {
            return Err(QueryError::invalid("key lookup requires a predicate"));
        };
        let value = element.value();
        let has_null =
            value.is_null() || value.as_list().is_some_and(|l| l.iter().any(Value::is_null));
        if has_null {
            return Err(QueryError::invalid(format!(
                "{} on key field '{}' cannot match null",
                operator.kind(),
                element.name()
            )));
        }
        match self.predicate(*operator, element)?.operand {
            Operand::Single(value) => Ok(vec![value]),
            Operand::Many(values) => Ok(values),
            Operand::Range(..) => Err(QueryError::invalid("BETWEEN cannot be a key lookup")),
        }
    }

    fn predicate(&self, operator: Operator, element: &Element) -> Result<Predicate<D::Native>> {
        let name = element.name();
        if name.is_empty() {
            return Err(QueryError::invalid(format!(
                "{} predicate has an empty field name",
                operator.kind()
            )));
        }
        let scope = Scope::new(self.entity, name);
        let value = element.value();

        let operand = match operator {
            Operator::Between => match value.as_list() {
                Some([lower, upper]) => Operand::Range(
                    self.dialect.to_native(lower, scope)?,
                    self.dialect.to_native(upper, scope)?,
                ),
                _ => {
                    return Err(QueryError::invalid(format!(
                        "BETWEEN on '{}' requires a two-element list",
                        name
                    )));
                }
            },
            Operator::In => {
                let items = value.as_list().ok_or_else(|| {
                    QueryError::invalid(format!("IN on '{}' requires a list value", name))
                })?;
                if items.is_empty() {
                    return Err(QueryError::invalid(format!(
                        "IN on '{}' requires at least one value",
                        name
                    )));
                }
                if !items.iter().all(Value::is_scalar) {
                    return Err(QueryError::invalid(format!(
                        "IN on '{}' accepts scalar values only",
                        name
                    )));
                }
                Operand::Many(
                    items
                        .iter()
                        .map(|v| self.dialect.to_native(v, scope))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            Operator::Like => {
                if value.as_str().is_none() {
                    return Err(QueryError::invalid(format!(
                        "LIKE on '{}' requires a text pattern",
                        name
                    )));
                }
                Operand::Single(self.dialect.to_native(value, scope)?)
            }
            _ => Operand::Single(self.dialect.to_native(value, scope)?),
        };

        Ok(Predicate {
            operator,
            name: name.to_string(),
            path: self.dialect.field(name, self.config),
            operand,
        })
    }
}

struct Split<'c> {
    key: &'c Condition,
    rest: Vec<&'c Condition>,
}

fn is_key_predicate(condition: &Condition, id_field: &str) -> bool {
    matches!(
        condition,
        Condition::Predicate { operator: Operator::Equals | Operator::In, element }
            if element.name() == id_field
    )
}

/// Find the ID predicate eligible for a key lookup
///
/// Only the root predicate or the first matching direct child of a root AND
/// qualifies. Predicates under OR or NOT are never diverted.
fn split_point_lookup<'c>(condition: &'c Condition, id_field: &str) -> Option<Split<'c>> {
    if is_key_predicate(condition, id_field) {
        return Some(Split {
            key: condition,
            rest: Vec::new(),
        });
    }
    let Condition::And(children) = condition else {
        return None;
    };
    let index = children.iter().position(|c| is_key_predicate(c, id_field))?;
    Some(Split {
        key: &children[index],
        rest: children
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, c)| c)
            .collect(),
    })
}
