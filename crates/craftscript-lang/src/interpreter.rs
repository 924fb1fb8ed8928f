//! Tree-walking interpreter for parsed CraftScript programs.
//!
//! The [`Interpreter`] walks a [`Program`] statement by statement, awaiting
//! every command handler before moving on. Each atomic command produces
//! exactly one [`CraftscriptResult`], which is collected into the final
//! [`RunReport`] and streamed on the run's [`RunJournal`]. Fatal conditions
//! (op budget, cancellation, assertion failures, scope and type errors, lost
//! connections) end the run with a [`Termination`].
//!
//! # Example
//!
//! ```no_run
//! use craftscript::interpreter::{Interpreter, RunContext};
//! use craftscript_core::config::RunOptions;
//! use craftscript_core::sim::SimWorld;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let world = SimWorld::flat();
//! let ctx = RunContext::new(world.registry()?, world.clone());
//! let report = Interpreter::new(ctx, RunOptions::default())
//!     .run_source("repeat(2) { dig(F1); }")
//!     .await;
//! println!("{} results", report.results.len());
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use craftscript_core::config::RunOptions;
use craftscript_core::dispatch::{ArgValue, CommandArgs, CommandHandler, CommandRegistry, HandlerError};
use craftscript_core::functions::{CustomFunction, FunctionStore, MemoryFunctionStore, ParamType};
use craftscript_core::journal::RunJournal;
use craftscript_core::result::{
    CraftscriptResult, ErrorKind, RunOutcome, RunReport, SourceLocation, Termination, TraceEvent,
    TraceKind,
};
use craftscript_core::selector::{HeadingContext, Pose, Vec3};
use craftscript_core::waypoint::{MemoryWaypointStore, WaypointStore};
use craftscript_core::world::{BlockQuery, ProbeError, WorldProbe};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::ast::*;
use crate::parser;
use crate::resolve::{resolve_position, ResolveError};
use crate::runtime::{binary, Env, Value};

/// Name of the intrinsic predicate reporting whether the last command succeeded.
pub const LAST_OK: &str = "last_ok";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Control flow of a run: `Err` ends the run.
type Flow<T = ()> = Result<T, Termination>;

/// Collaborators a run talks to.
#[derive(Clone)]
pub struct RunContext {
    pub registry: Arc<CommandRegistry>,
    pub world: Arc<dyn WorldProbe>,
    pub waypoints: Arc<dyn WaypointStore>,
    pub functions: Arc<dyn FunctionStore>,
}

impl RunContext {
    /// Context with empty in-memory waypoint and function stores.
    pub fn new(registry: CommandRegistry, world: Arc<dyn WorldProbe>) -> Self {
        Self {
            registry: Arc::new(registry),
            world,
            waypoints: Arc::new(MemoryWaypointStore::new()),
            functions: Arc::new(MemoryFunctionStore::new()),
        }
    }

    pub fn with_waypoints(mut self, store: Arc<dyn WaypointStore>) -> Self {
        self.waypoints = store;
        self
    }

    pub fn with_functions(mut self, store: Arc<dyn FunctionStore>) -> Self {
        self.functions = store;
        self
    }
}

#[derive(Debug, Clone)]
struct CallParam {
    name: String,
    ty: ParamType,
    default: Option<Value>,
    optional: bool,
}

/// A stored custom function, parsed and ready to call.
#[derive(Debug)]
struct LoadedFunction {
    name: String,
    params: Vec<CallParam>,
    body: Program,
}

enum Callee {
    Macro(Arc<MacroDecl>),
    Function(Arc<LoadedFunction>),
}

impl Callee {
    fn params(&self) -> Vec<CallParam> {
        match self {
            Callee::Macro(decl) => decl
                .params
                .iter()
                .map(|p| CallParam {
                    name: p.name.clone(),
                    ty: p.ty,
                    default: None,
                    optional: false,
                })
                .collect(),
            Callee::Function(f) => f.params.clone(),
        }
    }
}

/// Arguments of an atomic command after spatial resolution.
enum Prepared {
    Ready { args: CommandArgs, notes: Vec<String> },
    /// A waypoint could not be looked up. The command fails without running.
    Lookup { message: String, notes: Vec<String> },
}

pub struct Interpreter {
    ctx: RunContext,
    options: RunOptions,
    journal: Arc<RunJournal>,
    cancel: CancellationToken,
    env: Env,
    ops: u64,
    loop_iterations: u64,
    call_depth: usize,
    last_ok: Option<bool>,
    last_op: Option<String>,
    functions: HashMap<String, Option<Arc<LoadedFunction>>>,
    validated: HashSet<String>,
    results: Vec<CraftscriptResult>,
}

impl Interpreter {
    pub fn new(ctx: RunContext, options: RunOptions) -> Self {
        let journal = RunJournal::new(&options.actor, options.correlation_id.clone());
        Self {
            ctx,
            options,
            journal,
            cancel: CancellationToken::new(),
            env: Env::new(),
            ops: 0,
            loop_iterations: 0,
            call_depth: 0,
            last_ok: None,
            last_op: None,
            functions: HashMap::new(),
            validated: HashSet::new(),
            results: Vec::new(),
        }
    }

    /// Uses `journal` instead of a fresh in-memory one.
    pub fn with_journal(mut self, journal: Arc<RunJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run between statements.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn journal(&self) -> Arc<RunJournal> {
        self.journal.clone()
    }

    /// Parses and runs `source`. A syntax error ends the run before any command.
    pub async fn run_source(self, source: &str) -> RunReport {
        match parser::parse(source) {
            Ok(program) => self.run(&program).await,
            Err(e) => {
                warn!(line = e.line, column = e.column, error = %e.message, "parse failed");
                self.journal.start().await;
                self.finish(Err(e.into_termination())).await
            }
        }
    }

    pub async fn run(mut self, program: &Program) -> RunReport {
        self.journal.start().await;
        info!(
            run_id = %self.journal.run_id,
            actor = %self.options.actor,
            op_limit = self.options.op_limit,
            "run started"
        );

        let flow = match self.validate(&program.statements).await {
            Ok(()) => self.exec_statements(&program.statements).await,
            Err(t) => Err(t),
        };
        self.finish(flow).await
    }

    async fn finish(mut self, flow: Flow) -> RunReport {
        let outcome = match flow {
            Ok(()) => RunOutcome::Completed,
            Err(t) => {
                warn!(kind = %t.kind, message = %t.message, "run terminated");
                RunOutcome::Terminated(t)
            }
        };
        let report = RunReport {
            run_id: self.journal.run_id,
            correlation_id: self.journal.correlation_id.clone(),
            results: std::mem::take(&mut self.results),
            ops: self.ops,
            outcome,
        };
        self.journal.finish(&report).await;
        report
    }

    fn terminate(&self, kind: ErrorKind, message: impl Into<String>, loc: SourceLocation) -> Termination {
        let mut t = Termination::new(kind, message).at(loc);
        t.last_op_index = self.ops.checked_sub(1);
        t.op = self.last_op.clone();
        t
    }

    fn trace(&self, loc: SourceLocation, kind: TraceKind) {
        if self.options.trace {
            self.journal.trace(TraceEvent::new(loc, kind));
        }
    }

    fn check_cancelled(&self, loc: SourceLocation) -> Flow {
        if self.cancel.is_cancelled() {
            return Err(self.terminate(ErrorKind::Cancelled, "run cancelled", loc));
        }
        Ok(())
    }

    fn probe_failure(&self, e: ProbeError, loc: SourceLocation) -> Termination {
        match e {
            ProbeError::ConnectionLost(msg) => self.terminate(ErrorKind::ConnectionLost, msg, loc),
            ProbeError::Unavailable(msg) => {
                self.terminate(ErrorKind::Runtime, format!("world probe unavailable: {}", msg), loc)
            }
        }
    }

    async fn pose(&self, loc: SourceLocation) -> Flow<Pose> {
        self.ctx
            .world
            .pose()
            .await
            .map_err(|e| self.probe_failure(e, loc))
    }

    /// Checks every command and predicate name before anything runs.
    async fn validate(&mut self, statements: &[Statement]) -> Flow {
        let declared: HashSet<&str> = declared_macros(statements).into_iter().collect();
        let mut calls = Vec::new();
        walk_calls(statements, &mut |name, loc, is_predicate| {
            calls.push((name, loc, is_predicate))
        });

        for (name, loc, is_predicate) in calls {
            let known = if is_predicate {
                name == LAST_OK || self.ctx.registry.has_predicate(name)
            } else {
                declared.contains(name)
                    || self.env.find_macro(name).is_some()
                    || self.ctx.registry.has_command(name)
                    || self.fetch_function(name, loc).await?.is_some()
            };
            if !known {
                let what = if is_predicate { "predicate" } else { "command" };
                return Err(self.terminate(ErrorKind::Scope, format!("unknown {} '{}'", what, name), loc));
            }
        }
        Ok(())
    }

    /// Looks up and parses a custom function once per run.
    async fn fetch_function(&mut self, name: &str, loc: SourceLocation) -> Flow<Option<Arc<LoadedFunction>>> {
        if let Some(cached) = self.functions.get(name) {
            return Ok(cached.clone());
        }
        let stored = self
            .ctx
            .functions
            .get_function(&self.options.actor, name)
            .await
            .map_err(|e| {
                self.terminate(ErrorKind::Runtime, format!("could not load function '{}': {}", name, e), loc)
            })?;
        let loaded = match stored {
            Some(f) => Some(Arc::new(self.load_function(f, loc)?)),
            None => None,
        };
        self.functions.insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn load_function(&self, f: CustomFunction, loc: SourceLocation) -> Flow<LoadedFunction> {
        let body = parser::parse(&f.body).map_err(|e| {
            Termination::new(ErrorKind::Syntax, format!("in function '{}': {}", f.name, e))
                .at(e.location())
                .with_note(format!("called at {}", loc))
        })?;

        let mut params = Vec::with_capacity(f.args.len());
        for arg in f.args {
            let default = match &arg.default {
                Some(json) => Some(Value::from_json(json, arg.arg_type).ok_or_else(|| {
                    self.terminate(
                        ErrorKind::Runtime,
                        format!(
                            "default for '{}' in function '{}' is not a valid {}",
                            arg.name, f.name, arg.arg_type
                        ),
                        loc,
                    )
                })?),
                None => None,
            };
            params.push(CallParam {
                name: arg.name,
                ty: arg.arg_type,
                default,
                optional: arg.optional,
            });
        }
        debug!(name = %f.name, version = f.version, "loaded custom function");
        Ok(LoadedFunction {
            name: f.name,
            params,
            body,
        })
    }

    fn exec_statements<'a>(&'a mut self, statements: &'a [Statement]) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            for stmt in statements {
                if let Statement::Macro(decl) = stmt {
                    self.env.define_macro(decl.clone());
                }
            }
            for stmt in statements {
                if let Some(loc) = stmt.loc() {
                    self.check_cancelled(loc)?;
                }
                self.execute_statement(stmt).await?;
            }
            Ok(())
        })
    }

    fn exec_block<'a>(&'a mut self, block: &'a Block) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            self.env.push();
            let flow = self.exec_statements(&block.statements).await;
            self.env.pop();
            flow
        })
    }

    fn execute_statement<'a>(&'a mut self, stmt: &'a Statement) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            match stmt {
                Statement::Macro(_) | Statement::Empty => Ok(()),
                Statement::If { test, then_block, else_block, loc } => {
                    let taken = self.eval_condition(test).await?;
                    self.trace(*loc, TraceKind::BranchTaken { taken });
                    if taken {
                        self.exec_block(then_block).await
                    } else if let Some(alternate) = else_block {
                        self.exec_block(alternate).await
                    } else {
                        Ok(())
                    }
                }
                Statement::Repeat { kind, body, loc } => self.exec_repeat(kind, body, *loc).await,
                Statement::While { test, body, loc } => {
                    let mut iteration = 0;
                    while self.eval_condition(test).await? {
                        self.begin_iteration(*loc, iteration, None)?;
                        self.exec_block(body).await?;
                        iteration += 1;
                    }
                    Ok(())
                }
                Statement::Assert { test, message, loc } => {
                    let passed = self.eval_condition(test).await?;
                    self.trace(*loc, TraceKind::AssertionChecked { passed });
                    if passed {
                        return Ok(());
                    }
                    let message = message.clone().unwrap_or_else(|| "assertion failed".to_string());
                    Err(self.terminate(ErrorKind::Assertion, message, *loc))
                }
                Statement::Let { name, value, loc } => {
                    let value = self.eval(value).await?;
                    self.trace(
                        *loc,
                        TraceKind::VariableBound { name: name.clone(), value: value.to_string() },
                    );
                    self.env.declare(name, value);
                    Ok(())
                }
                Statement::Assign { name, value, loc } => {
                    let value = self.eval(value).await?;
                    let shown = value.to_string();
                    if !self.env.assign(name, value) {
                        return Err(self.terminate(
                            ErrorKind::Scope,
                            format!("assignment to undeclared variable '{}'", name),
                            *loc,
                        ));
                    }
                    self.trace(*loc, TraceKind::VariableBound { name: name.clone(), value: shown });
                    Ok(())
                }
                Statement::Command(cmd) => self.exec_command(cmd).await,
                Statement::Block(block) => self.exec_block(block).await,
            }
        })
    }

    /// Runs before every loop iteration.
    fn begin_iteration(&mut self, loc: SourceLocation, iteration: u64, binding: Option<(&str, i64)>) -> Flow {
        self.check_cancelled(loc)?;
        self.loop_iterations += 1;
        if self.loop_iterations > self.options.max_loop_iterations {
            return Err(self.terminate(
                ErrorKind::OpLimitExceeded,
                format!("loop iteration limit of {} exceeded", self.options.max_loop_iterations),
                loc,
            ));
        }
        self.trace(
            loc,
            TraceKind::LoopIteration {
                iteration,
                variable: binding.map(|(name, _)| name.to_string()),
                value: binding.map(|(_, v)| v),
            },
        );
        Ok(())
    }

    async fn exec_repeat(&mut self, kind: &RepeatKind, body: &Block, loc: SourceLocation) -> Flow {
        match kind {
            RepeatKind::Count(count) => {
                let n = self.eval_int(count, "repeat count").await?;
                for i in 0..n.max(0) {
                    self.begin_iteration(loc, i as u64, None)?;
                    self.exec_block(body).await?;
                }
                Ok(())
            }
            RepeatKind::Range { var, start, end, step } => {
                let mut i = self.eval_int(start, "range start").await?;
                let end = self.eval_int(end, "range end").await?;
                let step = match step {
                    Some(s) => self.eval_int(s, "range step").await?,
                    None => 1,
                };
                if step == 0 {
                    return Err(self.terminate(ErrorKind::Runtime, "repeat step cannot be zero", loc));
                }

                let mut iteration = 0;
                while (step > 0 && i < end) || (step < 0 && i > end) {
                    self.begin_iteration(loc, iteration, Some((var.as_str(), i)))?;
                    self.env.push();
                    self.env.declare(var, Value::Int(i));
                    let flow = self.exec_block(body).await;
                    self.env.pop();
                    flow?;
                    iteration += 1;
                    i = match i.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
                Ok(())
            }
        }
    }

    /// Macro first, then the dispatch table, then stored custom functions.
    fn exec_command<'a>(&'a mut self, cmd: &'a CommandStmt) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            if let Some(decl) = self.env.find_macro(&cmd.name) {
                return self.call(Callee::Macro(decl), cmd).await;
            }
            if let Some(handler) = self.ctx.registry.command(&cmd.name) {
                return self.dispatch(cmd, handler).await;
            }
            if let Some(function) = self.fetch_function(&cmd.name, cmd.loc).await? {
                return self.call(Callee::Function(function), cmd).await;
            }
            Err(self.terminate(ErrorKind::Scope, format!("unknown command '{}'", cmd.name), cmd.loc))
        })
    }

    async fn call(&mut self, callee: Callee, cmd: &CommandStmt) -> Flow {
        let depth = self.call_depth + 1;
        if depth > self.options.max_call_depth {
            return Err(self.terminate(
                ErrorKind::Runtime,
                format!(
                    "maximum call depth of {} exceeded calling '{}'",
                    self.options.max_call_depth, cmd.name
                ),
                cmd.loc,
            ));
        }

        let bound = self.bind_args(&cmd.name, &callee.params(), &cmd.args, cmd.loc).await?;
        if let Callee::Function(f) = &callee {
            if !self.validated.contains(&f.name) {
                self.validate(&f.body.statements).await?;
                self.validated.insert(f.name.clone());
            }
        }

        debug!(name = %cmd.name, depth, "entering call");
        self.trace(cmd.loc, TraceKind::MacroEntered { name: cmd.name.clone(), depth });
        self.call_depth = depth;
        self.env.push_frame();
        for (name, value) in bound {
            self.env.declare(&name, value);
        }
        let flow = match &callee {
            Callee::Macro(decl) => self.exec_statements(&decl.body.statements).await,
            Callee::Function(f) => self.exec_statements(&f.body.statements).await,
        };
        self.env.pop();
        self.call_depth -= 1;
        flow
    }

    async fn bind_args(
        &mut self,
        callee: &str,
        params: &[CallParam],
        args: &[Arg],
        loc: SourceLocation,
    ) -> Flow<Vec<(String, Value)>> {
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        let mut next_positional = 0;

        for arg in args {
            let value = self.eval(arg.value()).await?;
            let index = match arg {
                Arg::Positional(_) => {
                    let index = next_positional;
                    next_positional += 1;
                    if index >= params.len() {
                        return Err(self.terminate(
                            ErrorKind::Runtime,
                            format!(
                                "'{}' takes {} argument(s) but {} were given",
                                callee,
                                params.len(),
                                args.len()
                            ),
                            loc,
                        ));
                    }
                    index
                }
                Arg::Named { name, .. } => match params.iter().position(|p| &p.name == name) {
                    Some(index) => index,
                    None => {
                        return Err(self.terminate(
                            ErrorKind::Runtime,
                            format!("'{}' has no parameter '{}'", callee, name),
                            loc,
                        ))
                    }
                },
            };

            let param = &params[index];
            if slots[index].is_some() {
                return Err(self.terminate(
                    ErrorKind::Runtime,
                    format!("parameter '{}' of '{}' is bound twice", param.name, callee),
                    loc,
                ));
            }
            if !value.matches_type(param.ty) {
                return Err(self.terminate(
                    ErrorKind::Runtime,
                    format!(
                        "argument '{}' of '{}' must be {}, got {}",
                        param.name,
                        callee,
                        param.ty,
                        value.type_name()
                    ),
                    loc,
                ));
            }
            slots[index] = Some(value);
        }

        let mut bound = Vec::with_capacity(params.len());
        for (param, slot) in params.iter().zip(slots) {
            match slot.or_else(|| param.default.clone()) {
                Some(value) => bound.push((param.name.clone(), value)),
                None if param.optional => {}
                None => {
                    return Err(self.terminate(
                        ErrorKind::Runtime,
                        format!("missing argument '{}' for '{}'", param.name, callee),
                        loc,
                    ))
                }
            }
        }
        Ok(bound)
    }

    /// Dispatches one atomic command and records its result.
    async fn dispatch(&mut self, cmd: &CommandStmt, handler: Arc<dyn CommandHandler>) -> Flow {
        self.check_cancelled(cmd.loc)?;
        if self.ops >= self.options.op_limit {
            return Err(self.terminate(
                ErrorKind::OpLimitExceeded,
                format!("op limit of {} reached before '{}'", self.options.op_limit, cmd.name),
                cmd.loc,
            ));
        }
        // Counted only once the command is certain to produce a result.
        let op_index = self.ops;
        self.trace(cmd.loc, TraceKind::CommandStarted { op_index, op: cmd.name.clone() });

        let mut values = Vec::with_capacity(cmd.args.len());
        for arg in &cmd.args {
            let value = self.eval(arg.value()).await?;
            let key = match arg {
                Arg::Named { name, .. } => Some(name.clone()),
                Arg::Positional(_) => None,
            };
            values.push((key, value));
        }

        if self.options.auto_scan_before_ops && handler.needs_fresh_scan() {
            match self.ctx.world.scan(self.options.default_scan_radius).await {
                Ok(()) => {}
                Err(ProbeError::Unavailable(msg)) => {
                    warn!(op_index, op = %cmd.name, error = %msg, "auto-scan unavailable")
                }
                Err(e) => return Err(self.probe_failure(e, cmd.loc)),
            }
        }

        let prepared = self.prepare_args(values, cmd.loc).await?;
        self.ops += 1;
        self.last_op = Some(cmd.name.clone());

        let result = match prepared {
            Prepared::Lookup { message, notes } => {
                CraftscriptResult::failure(ErrorKind::AbsoluteLookup, message, cmd.loc, op_index, &cmd.name)
                    .with_code("unknown_waypoint")
                    .with_notes(notes)
            }
            Prepared::Ready { args, mut notes } => {
                let span = info_span!("command", op_index, op = %cmd.name, line = cmd.loc.line);
                let started = Instant::now();
                let outcome = match handler.validate(&args) {
                    Ok(()) => handler.execute(&args).instrument(span).await,
                    Err(e) => Err(e),
                };
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(op_index, op = %cmd.name, elapsed_ms, success = outcome.is_ok(), "command finished");

                match outcome {
                    Ok(output) => {
                        notes.extend(output.notes);
                        CraftscriptResult::success(op_index, &cmd.name, elapsed_ms).with_notes(notes)
                    }
                    Err(e) => {
                        let kind = match e {
                            HandlerError::ConnectionLost(_) => ErrorKind::ConnectionLost,
                            _ => ErrorKind::Command,
                        };
                        notes.extend(e.notes().iter().cloned());
                        CraftscriptResult::failure(kind, e.to_string(), cmd.loc, op_index, &cmd.name)
                            .with_code(e.code())
                            .with_notes(notes)
                    }
                }
            }
        };
        self.record(result, cmd.loc).await
    }

    /// Turns evaluated arguments into handler arguments, resolving every
    /// spatial value against a freshly read pose.
    async fn prepare_args(&self, values: Vec<(Option<String>, Value)>, loc: SourceLocation) -> Flow<Prepared> {
        let mut args = CommandArgs::new();
        let mut notes = Vec::new();
        let mut heading: Option<HeadingContext> = None;

        for (key, value) in values {
            let arg = match value {
                Value::Int(n) => ArgValue::Int(n),
                Value::Bool(b) => ArgValue::Bool(b),
                Value::Str(s) => ArgValue::Str(s),
                Value::Query(q) => ArgValue::Query(q),
                spatial => {
                    let ctx = match heading {
                        Some(ctx) => ctx,
                        None => {
                            let ctx = self.pose(loc).await?.context();
                            heading = Some(ctx);
                            ctx
                        }
                    };
                    let resolved =
                        resolve_position(&spatial, &ctx, self.ctx.waypoints.as_ref(), &self.options.actor).await;
                    match resolved {
                        Ok(pos) => {
                            notes.push(format!("{} -> {}", spatial, pos));
                            ArgValue::Position(pos)
                        }
                        Err(e @ ResolveError::Overflow(_)) => {
                            return Err(self.terminate(ErrorKind::Runtime, e.to_string(), loc));
                        }
                        Err(ResolveError::MissingWaypoint { name }) => {
                            notes.push(format!(
                                "waypoint '{}' not found for actor '{}'",
                                name, self.options.actor
                            ));
                            return Ok(Prepared::Lookup {
                                message: format!("unknown waypoint '{}'", name),
                                notes,
                            });
                        }
                        Err(e) => {
                            notes.push(format!("could not resolve {}", spatial));
                            return Ok(Prepared::Lookup { message: e.to_string(), notes });
                        }
                    }
                }
            };
            args = match key {
                Some(key) => args.named(key, arg),
                None => args.push(arg),
            };
        }
        Ok(Prepared::Ready { args, notes })
    }

    async fn record(&mut self, result: CraftscriptResult, loc: SourceLocation) -> Flow {
        let ok = result.is_success();
        self.last_ok = Some(ok);
        self.journal.record(result.clone()).await;
        self.results.push(result.clone());
        if ok {
            return Ok(());
        }

        let CraftscriptResult::Failure { error, code, message, op, notes, .. } = result else {
            return Ok(());
        };
        warn!(op_index = self.ops - 1, op = %op, code = ?code, error = %message, "command failed");
        let fatal = error == ErrorKind::ConnectionLost || self.options.stop_on_failure;
        if !fatal {
            return Ok(());
        }
        let mut t = self.terminate(error, format!("'{}' failed: {}", op, message), loc);
        t.notes = notes;
        Err(t)
    }

    async fn eval_int(&mut self, expr: &Expr, what: &str) -> Flow<i64> {
        match self.eval(expr).await? {
            Value::Int(n) => Ok(n),
            other => Err(self.terminate(
                ErrorKind::Runtime,
                format!("{} must be an int, got {}", what, other.type_name()),
                expr.loc,
            )),
        }
    }

    async fn eval_condition(&mut self, expr: &Expr) -> Flow<bool> {
        let value = self.eval(expr).await?;
        self.truthy(value, expr.loc).await
    }

    /// Booleans as-is, ints when non-zero, block queries when a match exists.
    async fn truthy(&self, value: Value, loc: SourceLocation) -> Flow<bool> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(n) => Ok(n != 0),
            Value::Query(query) => {
                let origin = match query.at {
                    Some(at) => at,
                    None => self.pose(loc).await?.position,
                };
                self.ctx
                    .world
                    .find_block(&query, origin, self.options.default_scan_radius)
                    .await
                    .map(|hit| hit.is_some())
                    .map_err(|e| self.probe_failure(e, loc))
            }
            other => Err(self.terminate(
                ErrorKind::Runtime,
                format!("condition must be a boolean, got {}", other.type_name()),
                loc,
            )),
        }
    }

    /// Resolves a spatial value right away. Used by `block(at: ...)`.
    async fn resolve_now(&self, value: &Value, loc: SourceLocation) -> Flow<Vec3> {
        let ctx = self.pose(loc).await?.context();
        match resolve_position(value, &ctx, self.ctx.waypoints.as_ref(), &self.options.actor).await {
            Ok(pos) => Ok(pos),
            Err(e @ ResolveError::MissingWaypoint { .. }) | Err(e @ ResolveError::Store(_)) => {
                Err(self.terminate(ErrorKind::AbsoluteLookup, e.to_string(), loc))
            }
            Err(e) => Err(self.terminate(ErrorKind::Runtime, e.to_string(), loc)),
        }
    }

    fn eval<'a>(&'a mut self, expr: &'a Expr) -> BoxFuture<'a, Flow<Value>> {
        Box::pin(async move {
            let loc = expr.loc;
            match &expr.kind {
                ExprKind::Int(n) => Ok(Value::Int(*n)),
                ExprKind::Str(s) => Ok(Value::Str(s.clone())),
                ExprKind::Bool(b) => Ok(Value::Bool(*b)),
                ExprKind::Ident(name) => match self.env.get(name) {
                    Some(value) => Ok(value.clone()),
                    None => Err(self.terminate(
                        ErrorKind::Scope,
                        format!("undeclared variable '{}'", name),
                        loc,
                    )),
                },
                ExprKind::Selector(sel) => Ok(Value::Selector(sel.clone())),
                ExprKind::World { x, y, z } => {
                    let mut coords = [0i32; 3];
                    for (slot, e) in coords.iter_mut().zip([x, y, z]) {
                        let n = self.eval_int(e, "world coordinate").await?;
                        *slot = i32::try_from(n).map_err(|_| {
                            self.terminate(
                                ErrorKind::Runtime,
                                format!("world coordinate {} is out of range", n),
                                e.loc,
                            )
                        })?;
                    }
                    Ok(Value::World(Vec3::new(coords[0], coords[1], coords[2])))
                }
                ExprKind::Waypoint(name) => Ok(Value::Waypoint(name.clone())),
                ExprKind::BlockQuery(entries) => {
                    let mut query = BlockQuery::new();
                    for (key, e) in entries {
                        let value = self.eval(e).await?;
                        if key == "at" {
                            let pos = self.resolve_now(&value, e.loc).await?;
                            query = query.at(pos);
                            continue;
                        }
                        let text = match value {
                            Value::Str(s) => s,
                            Value::Int(n) => n.to_string(),
                            Value::Bool(b) => b.to_string(),
                            other => {
                                return Err(self.terminate(
                                    ErrorKind::Runtime,
                                    format!("block query field '{}' cannot be a {}", key, other.type_name()),
                                    e.loc,
                                ))
                            }
                        };
                        query = query.with(key.clone(), text);
                    }
                    Ok(Value::Query(query))
                }
                ExprKind::Predicate { name, args } => {
                    Ok(Value::Bool(self.eval_predicate(name, args, loc).await?))
                }
                ExprKind::Unary { op, operand } => match op {
                    UnaryOp::Not => Ok(Value::Bool(!self.eval_condition(operand).await?)),
                    UnaryOp::Neg => match self.eval(operand).await? {
                        Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| {
                            self.terminate(ErrorKind::Runtime, "integer overflow in '-'", loc)
                        }),
                        other => Err(self.terminate(
                            ErrorKind::Runtime,
                            format!("cannot negate {}", other.type_name()),
                            loc,
                        )),
                    },
                },
                ExprKind::Binary { op: BinOp::And, left, right } => {
                    let value = self.eval_condition(left).await? && self.eval_condition(right).await?;
                    Ok(Value::Bool(value))
                }
                ExprKind::Binary { op: BinOp::Or, left, right } => {
                    let value = self.eval_condition(left).await? || self.eval_condition(right).await?;
                    Ok(Value::Bool(value))
                }
                ExprKind::Binary { op, left, right } => {
                    let lhs = self.eval(left).await?;
                    let rhs = self.eval(right).await?;
                    binary(*op, &lhs, &rhs).map_err(|msg| self.terminate(ErrorKind::Runtime, msg, loc))
                }
            }
        })
    }

    async fn eval_predicate(&mut self, name: &str, args: &[Arg], loc: SourceLocation) -> Flow<bool> {
        if name == LAST_OK {
            if !args.is_empty() {
                return Err(self.terminate(ErrorKind::Runtime, "last_ok() takes no arguments", loc));
            }
            let value = self.last_ok.unwrap_or(true);
            self.trace(loc, TraceKind::PredicateEvaluated { name: name.to_string(), value });
            return Ok(value);
        }

        let Some(handler) = self.ctx.registry.predicate(name) else {
            return Err(self.terminate(ErrorKind::Scope, format!("unknown predicate '{}'", name), loc));
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(arg.value()).await?;
            let key = match arg {
                Arg::Named { name, .. } => Some(name.clone()),
                Arg::Positional(_) => None,
            };
            values.push((key, value));
        }
        let args = match self.prepare_args(values, loc).await? {
            Prepared::Ready { args, .. } => args,
            Prepared::Lookup { message, notes } => {
                let mut t = self.terminate(ErrorKind::AbsoluteLookup, message, loc);
                t.notes = notes;
                return Err(t);
            }
        };

        match handler.evaluate(&args).await {
            Ok(value) => {
                debug!(predicate = name, value, "predicate evaluated");
                self.trace(loc, TraceKind::PredicateEvaluated { name: name.to_string(), value });
                Ok(value)
            }
            Err(HandlerError::ConnectionLost(msg)) => {
                Err(self.terminate(ErrorKind::ConnectionLost, msg, loc))
            }
            Err(e) => Err(self.terminate(
                ErrorKind::Runtime,
                format!("predicate '{}' failed: {}", name, e),
                loc,
            )),
        }
    }
}

/// Runs `program` to completion with a fresh interpreter.
pub async fn run(program: &Program, ctx: RunContext, options: RunOptions) -> RunReport {
    Interpreter::new(ctx, options).run(program).await
}
