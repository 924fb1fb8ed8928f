//! Shared mock handlers for the interpreter and CLI tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use craftscript::{Interpreter, RunContext, RunReport};
use craftscript_core::config::RunOptions;
use craftscript_core::dispatch::{
    CommandArgs, CommandHandler, CommandOutput, CommandRegistry, HandlerError, PredicateHandler,
};
use craftscript_core::sim::SimWorld;
use tokio_util::sync::CancellationToken;

/// Every call made to a [`RecordingCommand`], in order.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<(String, CommandArgs)>>,
}

impl Recorder {
    pub fn names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn args(&self, index: usize) -> CommandArgs {
        self.calls.lock().unwrap()[index].1.clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub struct RecordingCommand {
    name: String,
    recorder: Arc<Recorder>,
    fresh_scan: bool,
}

#[async_trait]
impl CommandHandler for RecordingCommand {
    fn needs_fresh_scan(&self) -> bool {
        self.fresh_scan
    }

    async fn execute(&self, args: &CommandArgs) -> Result<CommandOutput, HandlerError> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .push((self.name.clone(), args.clone()));
        Ok(CommandOutput::new())
    }
}

pub struct FailingCommand;

#[async_trait]
impl CommandHandler for FailingCommand {
    async fn execute(&self, _args: &CommandArgs) -> Result<CommandOutput, HandlerError> {
        Err(HandlerError::failed("no_path", "simulated failure"))
    }
}

pub struct DroppedCommand;

#[async_trait]
impl CommandHandler for DroppedCommand {
    async fn execute(&self, _args: &CommandArgs) -> Result<CommandOutput, HandlerError> {
        Err(HandlerError::ConnectionLost("socket closed".to_string()))
    }
}

/// Cancels the run it is part of.
pub struct CancelCommand(pub CancellationToken);

#[async_trait]
impl CommandHandler for CancelCommand {
    async fn execute(&self, _args: &CommandArgs) -> Result<CommandOutput, HandlerError> {
        self.0.cancel();
        Ok(CommandOutput::new())
    }
}

pub struct ConstPredicate(pub bool);

#[async_trait]
impl PredicateHandler for ConstPredicate {
    async fn evaluate(&self, _args: &CommandArgs) -> Result<bool, HandlerError> {
        Ok(self.0)
    }
}

/// A registry of mock handlers over a flat simulated world.
///
/// Commands: `forward`, `mark`, `touch` (asks for a fresh scan), `fail`,
/// `drop`, `stop` (cancels the run). Predicates: `yes`, `no`.
pub struct Harness {
    pub world: Arc<SimWorld>,
    pub recorder: Arc<Recorder>,
    pub registry: CommandRegistry,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        let world = SimWorld::flat();
        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let mut registry = CommandRegistry::new();
        for (name, fresh_scan) in [("forward", false), ("mark", false), ("touch", true)] {
            registry
                .register_command(
                    name,
                    Arc::new(RecordingCommand {
                        name: name.to_string(),
                        recorder: recorder.clone(),
                        fresh_scan,
                    }),
                )
                .unwrap();
        }
        registry.register_command("fail", Arc::new(FailingCommand)).unwrap();
        registry.register_command("drop", Arc::new(DroppedCommand)).unwrap();
        registry
            .register_command("stop", Arc::new(CancelCommand(cancel.clone())))
            .unwrap();
        registry.register_predicate("yes", Arc::new(ConstPredicate(true))).unwrap();
        registry.register_predicate("no", Arc::new(ConstPredicate(false))).unwrap();
        Self {
            world,
            recorder,
            registry,
            cancel,
        }
    }

    pub fn context(&self) -> RunContext {
        RunContext::new(self.registry.clone(), self.world.clone())
    }

    pub fn interpreter(&self, options: RunOptions) -> Interpreter {
        Interpreter::new(self.context(), options).with_cancellation(self.cancel.clone())
    }

    pub async fn run(&self, source: &str) -> RunReport {
        self.run_with(source, RunOptions::default()).await
    }

    pub async fn run_with(&self, source: &str, options: RunOptions) -> RunReport {
        self.interpreter(options).run_source(source).await
    }
}

/// A context backed entirely by the simulated world's own handlers.
pub fn sim_context() -> (Arc<SimWorld>, RunContext) {
    let world = SimWorld::flat();
    let registry = world.registry().unwrap();
    let ctx = RunContext::new(registry, world.clone());
    (world, ctx)
}
