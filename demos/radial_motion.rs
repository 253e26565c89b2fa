//! Radial Motion
//!
//! A mobile base drives a star pattern: rotate to a heading, drive out,
//! drive back, and repeat for the next ray. An orthogonal monitor region
//! reports progress from a repeating timer while the motion runs.
//!
//! Key concepts:
//! - Composite state with two orthogonal regions
//! - Action client shared by the states of one region
//! - Outcome events driving transitions, including one leaving the composite
//! - Global data and machine parameters
//!
//! Run with: cargo run --example radial_motion

use orthos::action::{ActionClient, ActionOutcome, ActionServer, GoalHandle};
use orthos::builder::{MachineBuilder, StateBuilder};
use orthos::core::{Event, EventKind, Reaction, RequestId, StateId};
use orthos::registry::Handle;
use orthos::runtime::{Machine, MachineConfig, StateBehavior, StateContext, StateError};
use orthos::state_enum;
use orthos::timer::{TimerClient, TimerMode};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

state_enum! {
    enum Radial {
        Idle,
        RadialMotion,
        Rotate,
        Forward,
        Return,
        Watching,
        Finished,
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum Command {
    Start,
}

#[derive(Clone, Debug)]
enum Motion {
    RotateTo(f64),
    Drive(f64),
}

// Simulated base controller: every goal succeeds after a short delay.
#[derive(Default)]
struct SimulatedBase {
    odometry: Mutex<(f64, f64, f64)>,
    cancelled: AtomicU64,
}

impl ActionServer for SimulatedBase {
    type Goal = Motion;
    type Result = (f64, f64, f64);
    type Feedback = f64;

    fn is_connected(&self) -> bool {
        true
    }

    fn wait_for_server(&self, _timeout: Duration) -> bool {
        true
    }

    fn send_goal(&self, goal: Motion, handle: GoalHandle<(f64, f64, f64), f64>) {
        let pose = {
            let mut pose = self.odometry.lock().unwrap_or_else(|e| e.into_inner());
            match goal {
                Motion::RotateTo(yaw) => pose.2 = yaw,
                Motion::Drive(distance) => {
                    pose.0 += distance * pose.2.cos();
                    pose.1 += distance * pose.2.sin();
                }
            }
            *pose
        };
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(40));
            handle.feedback(0.5);
            thread::sleep(Duration::from_millis(40));
            handle.complete(ActionOutcome::Succeeded, pose);
        });
    }

    fn cancel_goal(&self, _request: RequestId) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

type MoveBase = ActionClient<SimulatedBase, Command>;

fn move_base(ctx: &StateContext<'_, Radial, Command>) -> Result<Handle<MoveBase>, StateError> {
    ctx.resolve::<MoveBase>(Some("move_base"))
}

struct Rotate;

impl StateBehavior<Radial, Command> for Rotate {
    fn on_entry(&mut self, ctx: &mut StateContext<'_, Radial, Command>) -> Result<(), StateError> {
        let rays: u32 = ctx.param("rays", 4)?;
        let done = ctx.global::<u32>("rays_done").unwrap_or(0);
        let yaw = std::f64::consts::TAU * f64::from(done) / f64::from(rays);
        ctx.set_global("yaw", yaw)?;

        tracing::info!(ray = done + 1, yaw, "rotating");
        let client = move_base(ctx)?;
        ctx.get_mut(client)?.send_goal(Motion::RotateTo(yaw))?;
        Ok(())
    }
}

struct Forward;

impl StateBehavior<Radial, Command> for Forward {
    fn on_entry(&mut self, ctx: &mut StateContext<'_, Radial, Command>) -> Result<(), StateError> {
        let distance: f64 = ctx.param("distance", 1.0)?;
        let client = move_base(ctx)?;
        ctx.get_mut(client)?.send_goal(Motion::Drive(distance))?;
        Ok(())
    }
}

struct Return;

impl StateBehavior<Radial, Command> for Return {
    fn on_entry(&mut self, ctx: &mut StateContext<'_, Radial, Command>) -> Result<(), StateError> {
        let distance: f64 = ctx.param("distance", 1.0)?;
        let client = move_base(ctx)?;
        ctx.get_mut(client)?.send_goal(Motion::Drive(-distance))?;
        Ok(())
    }

    fn react(
        &mut self,
        event: &Event<Command>,
        ctx: &mut StateContext<'_, Radial, Command>,
    ) -> Result<Reaction<Radial>, StateError> {
        if event.kind() != &EventKind::succeeded("move_base", "motion") {
            return Ok(Reaction::Forward);
        }

        let done = ctx.global::<u32>("rays_done").unwrap_or(0) + 1;
        ctx.set_global("rays_done", done)?;
        if let Some(pose) = event.payload::<(f64, f64, f64)>() {
            tracing::info!(ray = done, x = pose.0, y = pose.1, "back at origin");
        }

        let rays: u32 = ctx.param("rays", 4)?;
        if done >= rays {
            return Ok(Reaction::transition(Radial::Finished));
        }
        Ok(Reaction::Forward)
    }
}

struct Watching;

impl StateBehavior<Radial, Command> for Watching {
    fn on_entry(&mut self, ctx: &mut StateContext<'_, Radial, Command>) -> Result<(), StateError> {
        let heartbeat = ctx.resolve::<TimerClient<Command>>(Some("heartbeat"))?;
        ctx.get_mut(heartbeat)?.start()?;
        Ok(())
    }

    fn react(
        &mut self,
        event: &Event<Command>,
        ctx: &mut StateContext<'_, Radial, Command>,
    ) -> Result<Reaction<Radial>, StateError> {
        match event.kind() {
            EventKind::Timer { .. } => {
                let done = ctx.global::<u32>("rays_done").unwrap_or(0);
                tracing::info!(rays_done = done, "heartbeat");
                Ok(Reaction::Consume)
            }
            EventKind::Feedback { client, .. } => {
                if let Some(progress) = event.payload::<f64>() {
                    tracing::debug!(%client, progress, "motion feedback");
                }
                Ok(Reaction::Consume)
            }
            _ => Ok(Reaction::Forward),
        }
    }
}

struct Finished;

impl StateBehavior<Radial, Command> for Finished {
    fn on_entry(&mut self, ctx: &mut StateContext<'_, Radial, Command>) -> Result<(), StateError> {
        tracing::info!("pattern complete");
        ctx.sender().stop()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Radial Motion ===\n");

    let server = Arc::new(SimulatedBase::default());
    let base = Arc::clone(&server);

    let definition = MachineBuilder::new()
        .initial(Radial::Idle)
        .state(StateBuilder::new(Radial::Idle).on_signal(Command::Start, Radial::RadialMotion))
        .state(
            StateBuilder::new(Radial::RadialMotion)
                .region("motion", Radial::Rotate)
                .region("monitor", Radial::Watching)
                .region_resource("motion", Some("move_base"), move |scope| {
                    ActionClient::new("move_base", Arc::clone(&base), scope)
                })
                .region_resource("monitor", Some("heartbeat"), |scope| {
                    TimerClient::new(
                        "heartbeat",
                        scope,
                        Duration::from_millis(150),
                        TimerMode::Repeat,
                    )
                }),
        )
        .state(
            StateBuilder::new(Radial::Rotate)
                .within(Radial::RadialMotion, "motion")
                .behavior(|| Rotate)
                .on(EventKind::succeeded("move_base", "motion"), Radial::Forward),
        )
        .state(
            StateBuilder::new(Radial::Forward)
                .within(Radial::RadialMotion, "motion")
                .behavior(|| Forward)
                .on(EventKind::succeeded("move_base", "motion"), Radial::Return),
        )
        .state(
            StateBuilder::new(Radial::Return)
                .within(Radial::RadialMotion, "motion")
                .behavior(|| Return)
                .on(EventKind::succeeded("move_base", "motion"), Radial::Rotate),
        )
        .state(
            StateBuilder::new(Radial::Watching)
                .within(Radial::RadialMotion, "monitor")
                .behavior(|| Watching),
        )
        .state(StateBuilder::new(Radial::Finished).behavior(|| Finished))
        .build()?;

    let config = MachineConfig::default()
        .with_param("rays", json!(3))
        .with_param("distance", json!(0.75));
    let mut machine = Machine::new(Arc::new(definition), config);

    machine.start()?;
    machine.signal(Command::Start)?;
    machine.run().await?;

    println!("\nTransitions:");
    for record in machine.transition_log().records() {
        println!(
            "  {} -> {} on {}",
            record.from.name(),
            record.to.name(),
            record.trigger
        );
    }
    println!("\nCancelled goals: {}", server.cancelled.load(Ordering::SeqCst));
    println!("Final status: {:?}", machine.status());

    Ok(())
}
