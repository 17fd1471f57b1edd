#![allow(dead_code)]

/*!
 * Shared Test Fixtures
 * A configurable process type and host environment for kernel tests
 */

use cycle_os_kernel::{
    capability, Capabilities, Capability, CycleContext, CycleId, DecodeError, HostEnv,
    InlineString, KernelResult, Pid, Process, ProcessError, Specifier, TypeTag,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared run log: which process ran, at what cycle, with which deps resolved
pub type Trace = Rc<RefCell<Vec<RunEvent>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    pub identifier: String,
    pub cycle: CycleId,
    /// Per declared dependency: the producer's run count, or None if unresolved
    pub resolved: Vec<(String, Option<u64>)>,
}

pub fn new_trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

/// Capability the test process publishes each run
pub struct TestSignal {
    pub identifier: String,
    pub runs: u64,
}

#[derive(Serialize, Deserialize)]
pub struct TestState {
    pub identifier: InlineString,
    pub deps: Vec<Specifier>,
    pub runs: u64,
}

/// Configurable process used across the integration tests
pub struct TestProc {
    pub id: Pid,
    pub tag: TypeTag,
    pub state: TestState,
    pub fail_on_run: bool,
    pub panic_on_run: bool,
    pub trace: Option<Trace>,
}

impl TestProc {
    pub fn new(id: Pid, tag: &str, identifier: &str, deps: Vec<Specifier>) -> Self {
        Self {
            id,
            tag: TypeTag::new(tag),
            state: TestState {
                identifier: identifier.into(),
                deps,
                runs: 0,
            },
            fail_on_run: false,
            panic_on_run: false,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: &Trace) -> Self {
        self.trace = Some(Rc::clone(trace));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_on_run = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_run = true;
        self
    }

    /// Decoder closure suitable for registry registration
    pub fn decoder(tag: &'static str) -> impl Fn(Pid, Value) -> KernelResult<Box<dyn Process>> {
        move |id, payload| {
            let state: TestState = serde_json::from_value(payload)
                .map_err(|e| DecodeError::MalformedRecord(e.to_string().into()))?;
            Ok(Box::new(TestProc {
                id,
                tag: TypeTag::new(tag),
                state,
                fail_on_run: false,
                panic_on_run: false,
                trace: None,
            }) as Box<dyn Process>)
        }
    }

    /// Decoder that attaches the shared trace to every reconstructed instance
    pub fn traced_decoder(
        tag: &'static str,
        trace: &Trace,
    ) -> impl Fn(Pid, Value) -> KernelResult<Box<dyn Process>> {
        let trace = Rc::clone(trace);
        move |id, payload| {
            let state: TestState = serde_json::from_value(payload)
                .map_err(|e| DecodeError::MalformedRecord(e.to_string().into()))?;
            Ok(Box::new(TestProc {
                id,
                tag: TypeTag::new(tag),
                state,
                fail_on_run: false,
                panic_on_run: false,
                trace: Some(Rc::clone(&trace)),
            }) as Box<dyn Process>)
        }
    }
}

impl Process for TestProc {
    fn id(&self) -> &Pid {
        &self.id
    }

    fn type_tag(&self) -> TypeTag {
        self.tag.clone()
    }

    fn identifier(&self) -> &str {
        self.state.identifier.as_str()
    }

    fn dependencies(&self) -> Vec<Specifier> {
        self.state.deps.clone()
    }

    fn run(
        &mut self,
        ctx: &CycleContext<'_>,
        deps: &Capabilities,
    ) -> KernelResult<Option<Capability>> {
        if self.panic_on_run {
            panic!("test process panic");
        }
        if self.fail_on_run {
            return Err(ProcessError::RunFailed {
                id: self.id.clone(),
                reason: "configured failure".into(),
            }
            .into());
        }
        self.state.runs += 1;
        if let Some(trace) = &self.trace {
            trace.borrow_mut().push(RunEvent {
                identifier: self.state.identifier.to_string(),
                cycle: ctx.cycle,
                resolved: self
                    .state
                    .deps
                    .iter()
                    .map(|spec| {
                        let runs = deps.get_as::<TestSignal>(spec).map(|signal| signal.runs);
                        (spec.to_string(), runs)
                    })
                    .collect(),
            });
        }
        Ok(Some(capability(TestSignal {
            identifier: self.state.identifier.to_string(),
            runs: self.state.runs,
        })))
    }

    fn encode(&self) -> KernelResult<Value> {
        serde_json::to_value(&self.state)
            .map_err(|e| ProcessError::CreationFailed(e.to_string().into()).into())
    }
}

/// Deterministic host environment
pub struct FixedHost {
    pub cycle: CycleId,
    pub used: f64,
    pub limit: f64,
}

impl FixedHost {
    pub fn at_cycle(cycle: CycleId) -> Self {
        Self {
            cycle,
            used: 0.0,
            limit: 100.0,
        }
    }
}

impl HostEnv for FixedHost {
    fn cycle(&self) -> CycleId {
        self.cycle
    }

    fn cpu_used(&self) -> f64 {
        self.used
    }

    fn cpu_limit(&self) -> f64 {
        self.limit
    }
}

pub fn spec(tag: &str, identifier: &str) -> Specifier {
    Specifier::new(TypeTag::new(tag), identifier)
}

pub fn pid(index: u64) -> Pid {
    Pid::from_index(index)
}
