//! Process runner answering from a script instead of spawning anything.

use backup_harness_ports::{BoxFuture, CommandSpec, ProcessError, ProcessOutput, ProcessRunner};
use backup_harness_shared::RequestContext;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Responder =
    Arc<dyn Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync + 'static>;

/// Records every command and answers by substring match on
/// [`CommandSpec::command_text`].
///
/// The most recently registered matching rule wins. Commands without a
/// matching rule succeed with empty output.
#[derive(Default)]
pub struct ScriptedProcessRunner {
    rules: Mutex<Vec<(String, Responder)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProcessRunner {
    /// Runner without rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `needle` with `output`.
    pub fn respond(&self, needle: &str, output: ProcessOutput) {
        self.respond_with(needle, move |_| output.clone());
    }

    /// Answer commands containing `needle` by calling `respond`.
    pub fn respond_with<F>(&self, needle: &str, respond: F)
    where
        F: Fn(&CommandSpec) -> ProcessOutput + Send + Sync + 'static,
    {
        lock(&self.rules).push((needle.to_string(), Arc::new(move |spec| Ok(respond(spec)))));
    }

    /// Fail commands containing `needle` with `error`.
    pub fn fail(&self, needle: &str, error: ProcessError) {
        lock(&self.rules).push((needle.to_string(), Arc::new(move |_| Err(error.clone()))));
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// [`CommandSpec::command_text`] of every call.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls).iter().map(CommandSpec::command_text).collect()
    }

    fn answer(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let text = spec.command_text();
        let responder = lock(&self.rules)
            .iter()
            .rev()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, responder)| Arc::clone(responder));
        match responder {
            Some(responder) => responder(spec),
            None => Ok(ProcessOutput::default()),
        }
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(
        &self,
        ctx: &RequestContext,
        spec: CommandSpec,
    ) -> BoxFuture<'_, Result<ProcessOutput, ProcessError>> {
        let cancelled = ctx.is_cancelled();
        Box::pin(async move {
            lock(&self.calls).push(spec.clone());
            if cancelled {
                return Err(ProcessError::Cancelled {
                    program: spec.program().to_string(),
                });
            }
            self.answer(&spec)
        })
    }
}
