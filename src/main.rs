/*!
 * Cycle-OS Kernel - Main Entry Point
 *
 * Simulated host: re-invokes the kernel from a cold start for N discrete
 * cycles, persisting the serialized snapshot between invocations the way
 * the real host would. Two small demo process types exercise the full
 * load / run / persist lifecycle and the capability plumbing.
 */

use anyhow::{Context, Result};
use cycle_os_kernel::{
    capability, Capabilities, Capability, CycleContext, CycleId, DecodeError, InlineString,
    Kernel, KernelResult, Pid, Process, Snapshot, SnapshotError, Specifier, SystemHost, TypeTag,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Host-imposed CPU quota per cycle, in milliseconds
const CPU_LIMIT_MS: f64 = 20.0;

fn pulse_tag() -> TypeTag {
    TypeTag::new("pl")
}

fn watch_tag() -> TypeTag {
    TypeTag::new("wa")
}

/// Capability the pulse process exposes to its dependents each cycle
struct PulseSignal {
    beats: u64,
}

#[derive(Serialize, Deserialize)]
struct PulseState {
    identifier: InlineString,
    beats: u64,
}

/// Root demo process: counts cycles and publishes the count
struct Pulse {
    id: Pid,
    state: PulseState,
}

impl Pulse {
    fn new(id: Pid, identifier: &str) -> Self {
        Self {
            id,
            state: PulseState {
                identifier: identifier.into(),
                beats: 0,
            },
        }
    }

    fn decode(id: Pid, payload: Value) -> KernelResult<Box<dyn Process>> {
        let state: PulseState = serde_json::from_value(payload)
            .map_err(|e| DecodeError::MalformedRecord(e.to_string().into()))?;
        Ok(Box::new(Self { id, state }))
    }
}

impl Process for Pulse {
    fn id(&self) -> &Pid {
        &self.id
    }

    fn type_tag(&self) -> TypeTag {
        pulse_tag()
    }

    fn identifier(&self) -> &str {
        self.state.identifier.as_str()
    }

    fn run(
        &mut self,
        ctx: &CycleContext<'_>,
        _deps: &Capabilities,
    ) -> KernelResult<Option<Capability>> {
        self.state.beats += 1;
        if ctx.cpu_remaining() > 1.0 {
            debug!("pulse {} beat {} at cycle {}", self.identifier(), self.state.beats, ctx.cycle);
        }
        Ok(Some(capability(PulseSignal {
            beats: self.state.beats,
        })))
    }

    fn encode(&self) -> KernelResult<Value> {
        serde_json::to_value(&self.state)
            .map_err(|e| SnapshotError::Serialize(e.to_string().into()).into())
    }
}

#[derive(Serialize, Deserialize)]
struct WatchState {
    identifier: InlineString,
    target: Specifier,
    observed_beats: u64,
}

/// Dependent demo process: consumes the pulse capability
struct Watch {
    id: Pid,
    state: WatchState,
}

impl Watch {
    fn new(id: Pid, identifier: &str, target: Specifier) -> Self {
        Self {
            id,
            state: WatchState {
                identifier: identifier.into(),
                target,
                observed_beats: 0,
            },
        }
    }

    fn decode(id: Pid, payload: Value) -> KernelResult<Box<dyn Process>> {
        let state: WatchState = serde_json::from_value(payload)
            .map_err(|e| DecodeError::MalformedRecord(e.to_string().into()))?;
        Ok(Box::new(Self { id, state }))
    }
}

impl Process for Watch {
    fn id(&self) -> &Pid {
        &self.id
    }

    fn type_tag(&self) -> TypeTag {
        watch_tag()
    }

    fn identifier(&self) -> &str {
        self.state.identifier.as_str()
    }

    fn dependencies(&self) -> Vec<Specifier> {
        vec![self.state.target.clone()]
    }

    fn run(
        &mut self,
        ctx: &CycleContext<'_>,
        deps: &Capabilities,
    ) -> KernelResult<Option<Capability>> {
        match deps.get_as::<PulseSignal>(&self.state.target) {
            Some(signal) => {
                self.state.observed_beats = signal.beats;
                debug!(
                    "watch {} observed {} beats at cycle {}",
                    self.identifier(),
                    signal.beats,
                    ctx.cycle
                );
            }
            None => {
                debug!("watch {}: pulse unavailable, deferring", self.identifier());
            }
        }
        Ok(None)
    }

    fn encode(&self) -> KernelResult<Value> {
        serde_json::to_value(&self.state)
            .map_err(|e| SnapshotError::Serialize(e.to_string().into()).into())
    }
}

fn build_kernel(cycle: CycleId) -> Kernel {
    Kernel::builder()
        .with_host(SystemHost::new(cycle, CPU_LIMIT_MS))
        .register_decoder(pulse_tag(), 10, Pulse::decode)
        .register_decoder(watch_tag(), 5, Watch::decode)
        .build()
}

fn bootstrap(kernel: &mut Kernel) -> Result<()> {
    if kernel.get_by_specifier(&pulse_tag(), "main").is_none() {
        kernel.add_process(|id| Box::new(Pulse::new(id, "main")))?;
    }
    if kernel.get_by_specifier(&watch_tag(), "main").is_none() {
        kernel.add_process(|id| {
            Box::new(Watch::new(id, "main", Specifier::new(pulse_tag(), "main")))
        })?;
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Snapshot::from_json(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::empty()),
        Err(e) => {
            Err(e).with_context(|| format!("failed to read snapshot at {}", path.display()))
        }
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    // Write-then-rename keeps the persisted snapshot atomic per cycle
    let raw = snapshot.to_json()?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, raw)
        .with_context(|| format!("failed to write snapshot at {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move snapshot into place at {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let snapshot_path = env::var("KERNEL_SNAPSHOT_PATH")
        .unwrap_or_else(|_| "/tmp/cycle-os-kernel/snapshot.json".to_string());
    let cycles: CycleId = env::args()
        .nth(1)
        .map(|raw| raw.parse())
        .transpose()
        .context("cycle count must be an integer")?
        .unwrap_or(5);

    let path = PathBuf::from(snapshot_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    info!("simulated host: {} cycles, snapshot at {}", cycles, path.display());

    for cycle in 0..cycles {
        let incoming = read_snapshot(&path)?;
        let mut kernel = build_kernel(cycle);
        kernel.load(&incoming);
        bootstrap(&mut kernel)?;
        kernel.start_of_cycle();
        kernel.run();
        let outgoing = kernel.end_of_cycle();
        write_snapshot(&path, &outgoing)?;
        let stats = kernel.stats();
        info!(
            "cycle {} complete: {} processes ran, {} faults isolated, {} records persisted",
            cycle,
            stats.processes_run,
            stats.faults_isolated,
            outgoing.processes.len()
        );
    }

    Ok(())
}
