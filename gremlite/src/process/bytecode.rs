// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Flat instruction form of a traversal
//!
//! [`Bytecode`] is the language-neutral representation of a traversal: the
//! source configuration and the steps, each as an operator name with typed
//! arguments. Child traversals nest as bytecode. Step labels become `as`
//! instructions following the labeled step.
//!
//! Lambdas have no instruction form; encoding a traversal that holds one fails.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TraversalError, TraversalResult};
use crate::process::parameters::{ParamKey, ParamValue, Parameters};
use crate::process::predicate::P;
use crate::process::step::{
    By, ChooseCondition, Comparator, ElementType, Operator, Order, Step, StepKind,
};
use crate::process::traversal::{GraphTraversalSource, Traversal};
use crate::structure::{Direction, Value, T};

/// Typed instruction argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Argument {
    Value(Value),
    Predicate(P),
    Traversal(Bytecode),
    Token(T),
    Order(Order),
    Operator(Operator),
    Direction(Direction),
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(value) => write!(f, "{}", value),
            Argument::Predicate(predicate) => write!(f, "{}", predicate),
            Argument::Traversal(bytecode) => write!(f, "{}", bytecode),
            Argument::Token(token) => write!(f, "{}", token),
            Argument::Order(order) => write!(f, "{}", order),
            Argument::Operator(operator) => write!(f, "{}", operator),
            Argument::Direction(direction) => write!(f, "{}", direction),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Value(Value::from(value))
    }
}

impl From<P> for Argument {
    fn from(predicate: P) -> Self {
        Argument::Predicate(predicate)
    }
}

impl From<Bytecode> for Argument {
    fn from(bytecode: Bytecode) -> Self {
        Argument::Traversal(bytecode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub operator: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

impl Instruction {
    pub fn new(operator: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            operator: operator.into(),
            arguments,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arguments: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
        write!(f, "{}({})", self.operator, arguments.join(", "))
    }
}

/// Source and step instructions of a traversal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    #[serde(default)]
    pub source: Vec<Instruction>,
    #[serde(default)]
    pub steps: Vec<Instruction>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, operator: &str, arguments: Vec<Argument>) {
        self.source.push(Instruction::new(operator, arguments));
    }

    pub fn add_step(&mut self, operator: &str, arguments: Vec<Argument>) {
        self.steps.push(Instruction::new(operator, arguments));
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.steps.is_empty()
    }

    pub fn from_json(json: &str) -> TraversalResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TraversalError::Bytecode(format!("Invalid bytecode JSON: {}", e)))
    }

    pub fn to_json(&self) -> TraversalResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TraversalError::Bytecode(format!("Failed to serialize bytecode: {}", e)))
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |instructions: &[Instruction]| {
            instructions
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "[[{}], [{}]]", render(&self.source), render(&self.steps))
    }
}

// --- encoding ----------------------------------------------------------

fn lambda_error(step: &Step) -> TraversalError {
    TraversalError::Bytecode(format!(
        "Lambdas can not be translated to bytecode: {}",
        step
    ))
}

fn values(items: &[Value]) -> Vec<Argument> {
    items.iter().cloned().map(Argument::Value).collect()
}

fn strings(items: &[String]) -> Vec<Argument> {
    items.iter().map(|s| Argument::from(s.as_str())).collect()
}

fn children(traversals: &[Traversal]) -> TraversalResult<Vec<Argument>> {
    traversals
        .iter()
        .map(|t| t.to_bytecode().map(Argument::Traversal))
        .collect()
}

fn key_argument(key: &str) -> Argument {
    match T::from_accessor(key) {
        Some(token) => Argument::Token(token),
        None => Argument::from(key),
    }
}

fn by_argument(by: &By, step: &Step) -> TraversalResult<Option<Argument>> {
    Ok(match by {
        By::Identity => None,
        By::Key(key) => Some(Argument::from(key.as_str())),
        By::Token(token) => Some(Argument::Token(*token)),
        By::Traversal(child) => Some(Argument::Traversal(child.to_bytecode()?)),
        By::Function(_) => return Err(lambda_error(step)),
    })
}

fn param_argument(value: &ParamValue) -> TraversalResult<Argument> {
    match value {
        ParamValue::Literal(value) => Ok(Argument::Value(value.clone())),
        ParamValue::Traversal(child) => Ok(Argument::Traversal(child.to_bytecode()?)),
    }
}

fn param_key_argument(key: &ParamKey) -> Argument {
    match key {
        ParamKey::Id => Argument::Token(T::Id),
        ParamKey::Label => Argument::Token(T::Label),
        other => Argument::from(other.to_string().as_str()),
    }
}

/// `property()` instructions for every entry not in `skip`
fn encode_properties(
    bytecode: &mut Bytecode,
    parameters: &Parameters,
    skip: &[ParamKey],
) -> TraversalResult<()> {
    for key in parameters.keys().filter(|k| !skip.contains(k)) {
        for value in parameters.raw(key) {
            bytecode.add_step(
                "property",
                vec![param_key_argument(key), param_argument(value)?],
            );
        }
    }
    Ok(())
}

/// The single literal label of a mutation, when it has exactly one
fn literal_label(parameters: &Parameters) -> Option<&Value> {
    match parameters.raw(&ParamKey::Label) {
        [ParamValue::Literal(label)] => Some(label),
        _ => None,
    }
}

fn encode_step(bytecode: &mut Bytecode, step: &Step) -> TraversalResult<()> {
    match &step.kind {
        StepKind::Graph { returns, ids } => {
            let operator = match returns {
                ElementType::Vertex => "V",
                ElementType::Edge => "E",
            };
            bytecode.add_step(operator, values(ids));
        }
        StepKind::Inject(items) => bytecode.add_step("inject", values(items)),
        StepKind::Identity => bytecode.add_step("identity", vec![]),
        StepKind::Vertex {
            direction,
            edge_labels,
            returns,
        } => {
            let operator = match (direction, returns) {
                (Direction::Out, ElementType::Vertex) => "out",
                (Direction::In, ElementType::Vertex) => "in",
                (Direction::Both, ElementType::Vertex) => "both",
                (Direction::Out, ElementType::Edge) => "outE",
                (Direction::In, ElementType::Edge) => "inE",
                (Direction::Both, ElementType::Edge) => "bothE",
            };
            bytecode.add_step(operator, strings(edge_labels));
        }
        StepKind::EdgeVertex(direction) => {
            let operator = match direction {
                Direction::Out => "outV",
                Direction::In => "inV",
                Direction::Both => "bothV",
            };
            bytecode.add_step(operator, vec![]);
        }
        StepKind::EdgeOtherVertex => bytecode.add_step("otherV", vec![]),
        StepKind::Has(containers) => {
            for container in containers {
                bytecode.add_step(
                    "has",
                    vec![
                        key_argument(&container.key),
                        Argument::Predicate(container.predicate.clone()),
                    ],
                );
            }
        }
        StepKind::TraversalFilter(child) => {
            bytecode.add_step("filter", vec![Argument::Traversal(child.to_bytecode()?)])
        }
        StepKind::And(branches) => bytecode.add_step("and", children(branches)?),
        StepKind::Or(branches) => bytecode.add_step("or", children(branches)?),
        StepKind::Not(child) => {
            bytecode.add_step("not", vec![Argument::Traversal(child.to_bytecode()?)])
        }
        StepKind::Is(predicate) => bytecode.add_step("is", vec![predicate.clone().into()]),
        StepKind::Dedup => bytecode.add_step("dedup", vec![]),
        StepKind::Range { low, high } => {
            let high = high.map(|h| h as i64).unwrap_or(-1);
            bytecode.add_step(
                "range",
                vec![
                    Argument::Value(Value::Integer(*low as i64)),
                    Argument::Value(Value::Integer(high)),
                ],
            );
        }
        StepKind::Tail(limit) => {
            bytecode.add_step("tail", vec![Argument::Value(Value::Integer(*limit as i64))])
        }
        StepKind::Coin(probability) => {
            bytecode.add_step("coin", vec![Argument::Value(Value::Float(*probability))])
        }
        StepKind::Id => bytecode.add_step("id", vec![]),
        StepKind::Label => bytecode.add_step("label", vec![]),
        StepKind::Values(keys) => bytecode.add_step("values", strings(keys)),
        StepKind::Constant(value) => bytecode.add_step("constant", vec![value.clone().into()]),
        StepKind::Path => bytecode.add_step("path", vec![]),
        StepKind::Select(labels) => bytecode.add_step("select", strings(labels)),
        StepKind::Sack => bytecode.add_step("sack", vec![]),
        StepKind::SackOperator { operator, by } => {
            bytecode.add_step("sack", vec![Argument::Operator(*operator)]);
            if let Some(key) = by {
                bytecode.add_step("by", vec![Argument::from(key.as_str())]);
            }
        }
        StepKind::Loops => bytecode.add_step("loops", vec![]),
        StepKind::Unfold => bytecode.add_step("unfold", vec![]),
        StepKind::LambdaFilter(_)
        | StepKind::LambdaMap(_)
        | StepKind::LambdaFlatMap(_)
        | StepKind::LambdaSideEffect(_) => return Err(lambda_error(step)),
        StepKind::Count => bytecode.add_step("count", vec![]),
        StepKind::Sum => bytecode.add_step("sum", vec![]),
        StepKind::Mean => bytecode.add_step("mean", vec![]),
        StepKind::Fold => bytecode.add_step("fold", vec![]),
        StepKind::GroupCount(by) => {
            bytecode.add_step("groupCount", vec![]);
            if let Some(argument) = by_argument(by, step)? {
                bytecode.add_step("by", vec![argument]);
            }
        }
        StepKind::Order(bys) => {
            bytecode.add_step("order", vec![]);
            for order_by in bys {
                let order = match order_by.comparator {
                    Comparator::Order(order) => order,
                    Comparator::Lambda(_) => return Err(lambda_error(step)),
                };
                let mut arguments: Vec<Argument> = by_argument(&order_by.by, step)?.into_iter().collect();
                arguments.push(Argument::Order(order));
                bytecode.add_step("by", arguments);
            }
        }
        StepKind::Aggregate(key) => bytecode.add_step("aggregate", vec![key.as_str().into()]),
        StepKind::Store(key) => bytecode.add_step("store", vec![key.as_str().into()]),
        StepKind::Cap(key) => bytecode.add_step("cap", vec![key.as_str().into()]),
        StepKind::Barrier => bytecode.add_step("barrier", vec![]),
        StepKind::Union(branches) => bytecode.add_step("union", children(branches)?),
        StepKind::Choose {
            condition,
            true_branch,
            false_branch,
        } => {
            let condition = match condition {
                ChooseCondition::Traversal(child) => child,
                ChooseCondition::Lambda(_) => return Err(lambda_error(step)),
            };
            bytecode.add_step(
                "choose",
                vec![
                    Argument::Traversal(condition.to_bytecode()?),
                    Argument::Traversal(true_branch.to_bytecode()?),
                    Argument::Traversal(false_branch.to_bytecode()?),
                ],
            );
        }
        StepKind::Repeat {
            body,
            times,
            until,
            emit,
        } => {
            bytecode.add_step("repeat", vec![Argument::Traversal(body.to_bytecode()?)]);
            if let Some(n) = times {
                bytecode.add_step("times", vec![Argument::Value(Value::Integer(i64::from(*n)))]);
            }
            if let Some(condition) = until {
                bytecode.add_step("until", vec![Argument::Traversal(condition.to_bytecode()?)]);
            }
            if *emit {
                bytecode.add_step("emit", vec![]);
            }
        }
        StepKind::AddVertex { parameters, .. } => match literal_label(parameters) {
            Some(label) => {
                bytecode.add_step("addV", vec![label.clone().into()]);
                encode_properties(bytecode, parameters, &[ParamKey::Label])?;
            }
            None => {
                bytecode.add_step("addV", vec![]);
                encode_properties(bytecode, parameters, &[])?;
            }
        },
        StepKind::AddEdge { parameters, .. } => {
            let label = literal_label(parameters).ok_or_else(|| {
                TraversalError::Bytecode(format!("addE() requires a literal label: {}", step))
            })?;
            bytecode.add_step("addE", vec![label.clone().into()]);
            for (key, operator) in [(ParamKey::From, "from"), (ParamKey::To, "to")] {
                for value in parameters.raw(&key) {
                    bytecode.add_step(operator, vec![param_argument(value)?]);
                }
            }
            encode_properties(
                bytecode,
                parameters,
                &[ParamKey::Label, ParamKey::From, ParamKey::To],
            )?;
        }
        StepKind::AddProperty { parameters, .. } => encode_properties(bytecode, parameters, &[])?,
    }
    for label in step.labels() {
        bytecode.add_step("as", vec![label.as_str().into()]);
    }
    Ok(())
}

// --- decoding ----------------------------------------------------------

/// Positional view over the arguments of one instruction
struct Args<'a> {
    operator: &'a str,
    arguments: &'a [Argument],
}

impl<'a> Args<'a> {
    fn new(instruction: &'a Instruction) -> Self {
        Self {
            operator: instruction.operator.as_str(),
            arguments: &instruction.arguments,
        }
    }

    fn len(&self) -> usize {
        self.arguments.len()
    }

    fn error(&self, index: usize, expected: &str) -> TraversalError {
        TraversalError::Bytecode(format!(
            "{}() expects {} as argument {}",
            self.operator,
            expected,
            index + 1
        ))
    }

    fn get(&self, index: usize) -> Option<&'a Argument> {
        self.arguments.get(index)
    }

    fn value(&self, index: usize) -> TraversalResult<Value> {
        match self.get(index) {
            Some(Argument::Value(value)) => Ok(value.clone()),
            _ => Err(self.error(index, "a value")),
        }
    }

    fn string(&self, index: usize) -> TraversalResult<String> {
        match self.get(index) {
            Some(Argument::Value(Value::String(s))) => Ok(s.clone()),
            _ => Err(self.error(index, "a string")),
        }
    }

    fn integer(&self, index: usize) -> TraversalResult<i64> {
        match self.get(index) {
            Some(Argument::Value(Value::Integer(n))) => Ok(*n),
            _ => Err(self.error(index, "an integer")),
        }
    }

    fn unsigned(&self, index: usize) -> TraversalResult<u64> {
        u64::try_from(self.integer(index)?).map_err(|_| self.error(index, "a non-negative integer"))
    }

    fn float(&self, index: usize) -> TraversalResult<f64> {
        match self.get(index) {
            Some(Argument::Value(value)) => {
                value.as_f64().ok_or_else(|| self.error(index, "a number"))
            }
            _ => Err(self.error(index, "a number")),
        }
    }

    fn traversal(&self, index: usize) -> TraversalResult<Traversal> {
        match self.get(index) {
            Some(Argument::Traversal(bytecode)) => Traversal::from_bytecode(bytecode),
            _ => Err(self.error(index, "a traversal")),
        }
    }

    fn all_values(&self) -> TraversalResult<Vec<Value>> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }

    fn all_strings(&self) -> TraversalResult<Vec<String>> {
        (0..self.len()).map(|i| self.string(i)).collect()
    }

    fn all_traversals(&self) -> TraversalResult<Vec<Traversal>> {
        (0..self.len()).map(|i| self.traversal(i)).collect()
    }

    fn predicate(&self, index: usize) -> TraversalResult<P> {
        match self.get(index) {
            Some(Argument::Predicate(predicate)) => Ok(predicate.clone()),
            Some(Argument::Value(value)) => Ok(P::eq(value.clone())),
            _ => Err(self.error(index, "a predicate")),
        }
    }

    fn param_value(&self, index: usize) -> TraversalResult<ParamValue> {
        match self.get(index) {
            Some(Argument::Value(value)) => Ok(ParamValue::Literal(value.clone())),
            Some(Argument::Traversal(bytecode)) => {
                Ok(ParamValue::Traversal(Traversal::from_bytecode(bytecode)?))
            }
            _ => Err(self.error(index, "a value or a traversal")),
        }
    }

    fn param_key(&self, index: usize) -> TraversalResult<ParamKey> {
        match self.get(index) {
            Some(Argument::Token(token)) => Ok(ParamKey::from(*token)),
            Some(Argument::Value(Value::String(key))) => Ok(ParamKey::property(key.as_str())),
            _ => Err(self.error(index, "a property key")),
        }
    }

    fn by(&self, index: usize) -> TraversalResult<By> {
        match self.get(index) {
            None => Ok(By::Identity),
            Some(Argument::Value(Value::String(key))) => Ok(By::Key(key.clone())),
            Some(Argument::Token(token)) => Ok(By::Token(*token)),
            Some(Argument::Traversal(bytecode)) => {
                Ok(By::Traversal(Traversal::from_bytecode(bytecode)?))
            }
            _ => Err(self.error(index, "a key, a token or a traversal")),
        }
    }
}

fn decode_by(traversal: Traversal, args: &Args<'_>) -> TraversalResult<Traversal> {
    let order = match args.arguments.last() {
        Some(Argument::Order(order)) => Some(*order),
        _ => None,
    };
    Ok(match order {
        Some(order) if args.len() == 1 => traversal.by_order(By::Identity, order),
        Some(order) => traversal.by_order(args.by(0)?, order),
        None => traversal.by(args.by(0)?),
    })
}

fn decode_step(traversal: Traversal, instruction: &Instruction) -> TraversalResult<Traversal> {
    let args = Args::new(instruction);
    Ok(match args.operator {
        "V" => traversal.v(args.all_values()?),
        "E" => traversal.e(args.all_values()?),
        "inject" => traversal.inject(args.all_values()?),
        "identity" => traversal.identity(),
        "out" => traversal.out(args.all_strings()?),
        "in" => traversal.in_(args.all_strings()?),
        "both" => traversal.both(args.all_strings()?),
        "outE" => traversal.out_e(args.all_strings()?),
        "inE" => traversal.in_e(args.all_strings()?),
        "bothE" => traversal.both_e(args.all_strings()?),
        "outV" => traversal.out_v(),
        "inV" => traversal.in_v(),
        "bothV" => traversal.both_v(),
        "otherV" => traversal.other_v(),
        "has" => match (args.len(), args.get(0)) {
            (1, _) => traversal.has_key(&args.string(0)?),
            (_, Some(Argument::Token(token))) => traversal.has_t(*token, args.predicate(1)?),
            _ => traversal.has(&args.string(0)?, args.predicate(1)?),
        },
        "hasLabel" => traversal.has_label(args.all_strings()?),
        "hasId" => traversal.has_id(args.all_values()?),
        "hasNot" => traversal.has_not(&args.string(0)?),
        "filter" => traversal.filter(args.traversal(0)?),
        "and" => traversal.and(args.all_traversals()?),
        "or" => traversal.or(args.all_traversals()?),
        "not" => traversal.not(args.traversal(0)?),
        "is" => traversal.is(args.predicate(0)?),
        "dedup" => traversal.dedup(),
        "limit" => traversal.limit(args.unsigned(0)?),
        "range" => traversal.range(args.unsigned(0)?, args.integer(1)?),
        "tail" if args.len() == 0 => traversal.tail(1),
        "tail" => traversal.tail(args.unsigned(0)?),
        "coin" => traversal.coin(args.float(0)?),
        "id" => traversal.id(),
        "label" => traversal.label(),
        "values" => traversal.values(args.all_strings()?),
        "constant" => traversal.constant(args.value(0)?),
        "path" => traversal.path(),
        "select" => traversal.select(args.all_strings()?),
        "sack" => match args.get(0) {
            None => traversal.sack(),
            Some(Argument::Operator(operator)) => traversal.sack_op(*operator),
            Some(_) => return Err(args.error(0, "an operator")),
        },
        "loops" => traversal.loops(),
        "unfold" => traversal.unfold(),
        "count" => traversal.count(),
        "sum" => traversal.sum(),
        "mean" => traversal.mean(),
        "fold" => traversal.fold(),
        "groupCount" => traversal.group_count(),
        "order" => traversal.order(),
        "by" => decode_by(traversal, &args)?,
        "aggregate" => traversal.aggregate(&args.string(0)?),
        "store" => traversal.store(&args.string(0)?),
        "cap" => traversal.cap(&args.string(0)?),
        "barrier" => traversal.barrier(),
        "union" => traversal.union(args.all_traversals()?),
        "choose" => traversal.choose(args.traversal(0)?, args.traversal(1)?, args.traversal(2)?),
        "repeat" => traversal.repeat(args.traversal(0)?),
        "times" => {
            let n = u32::try_from(args.integer(0)?).map_err(|_| args.error(0, "a loop count"))?;
            traversal.times(n)
        }
        "until" => traversal.until(args.traversal(0)?),
        "emit" => traversal.emit(),
        "addV" if args.len() == 0 => traversal.add_v(()),
        "addV" => traversal.add_v(args.string(0)?),
        "addE" => traversal.add_e(&args.string(0)?),
        "from" => traversal.from(args.param_value(0)?),
        "to" => traversal.to(args.param_value(0)?),
        "property" => traversal.property(args.param_key(0)?, args.param_value(1)?),
        "as" => traversal.as_(&args.string(0)?),
        other => {
            return Err(TraversalError::Bytecode(format!(
                "Unknown step instruction: {}",
                other
            )))
        }
    })
}

fn decode_steps(mut traversal: Traversal, steps: &[Instruction]) -> TraversalResult<Traversal> {
    for instruction in steps {
        traversal = decode_step(traversal, instruction)?;
    }
    match traversal.error() {
        Some(error) => Err(error.clone()),
        None => Ok(traversal),
    }
}

impl Traversal {
    /// Encode the steps and source configuration; fails on lambdas
    pub fn to_bytecode(&self) -> TraversalResult<Bytecode> {
        let mut bytecode = Bytecode::new();
        if let Some(sack) = self.sack_config() {
            let mut arguments = vec![Argument::Value(sack.initial.clone())];
            if let Some(merge) = sack.merge {
                arguments.push(Argument::Operator(merge));
            }
            bytecode.add_source("withSack", arguments);
        }
        if !self.is_bulking() {
            bytecode.add_source("withBulk", vec![Argument::Value(Value::Boolean(false))]);
        }
        for step in self.steps() {
            encode_step(&mut bytecode, step)?;
        }
        Ok(bytecode)
    }

    /// Rebuild an anonymous traversal; source instructions need a [`GraphTraversalSource`]
    pub fn from_bytecode(bytecode: &Bytecode) -> TraversalResult<Traversal> {
        if let Some(instruction) = bytecode.source.first() {
            return Err(TraversalError::Bytecode(format!(
                "Source instructions require a traversal source: {}",
                instruction
            )));
        }
        decode_steps(Traversal::new(), &bytecode.steps)
    }
}

impl GraphTraversalSource {
    /// Apply the source instructions to a copy of this source and rebuild the steps on it
    pub fn traversal_from_bytecode(&self, bytecode: &Bytecode) -> TraversalResult<Traversal> {
        let mut source = self.clone();
        for instruction in &bytecode.source {
            let args = Args::new(instruction);
            source = match args.operator {
                "withSack" => match args.get(1) {
                    None => source.with_sack(args.value(0)?),
                    Some(Argument::Operator(merge)) => source.with_sack_merge(args.value(0)?, *merge),
                    Some(_) => return Err(args.error(1, "an operator")),
                },
                "withBulk" => match args.value(0)? {
                    Value::Boolean(bulking) => source.with_bulk(bulking),
                    _ => return Err(args.error(0, "a boolean")),
                },
                other => {
                    return Err(TraversalError::Bytecode(format!(
                        "Unknown source instruction: {}",
                        other
                    )))
                }
            };
        }
        let anonymous = decode_steps(Traversal::new(), &bytecode.steps)?;
        Ok(source.bind(anonymous))
    }
}
