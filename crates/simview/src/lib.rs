//! # Simview
//!
//! Several independently stepped simulations sharing one graphics layer
//! that may only be used from one thread at a time.
//!
//! ```text
//!  driving thread ×N                         render coordinator (one)
//!  ─────────────────                         ────────────────────────
//!  SimulationClient::update()                init: offscreen, then windows
//!    step() under the state lock             loop:
//!    camera due? ── pending ──────────────►    paint windows by fps
//!                ◄─ handoff release ──────     serve camera requests
//!  SimulationClient::outputs()                 dispatch input
//!    sensors, camera copy if fresh           exit: release surfaces, terminate
//! ```
//!
//! Physics never waits on graphics, except for the bounded camera
//! rendezvous. A surface that fails is marked exited and the simulation
//! keeps stepping.
//!
//! ## Example
//!
//! ```rust,ignore
//! use simview::{ClientOutputs, SimContext};
//! use simview_core::{BallisticOracle, ClientSettings, ContextConfig};
//! use simview_render::SoftwareBackend;
//!
//! let ctx = SimContext::new(SoftwareBackend::new(), ContextConfig::default())?;
//! let mut client = ctx.register_client(model, Box::new(BallisticOracle::new()), &ClientSettings::default())?;
//! let mut out = ClientOutputs::new(&client.interface());
//! for _ in 0..1000 {
//!     client.update(&[0.0])?;
//!     if client.outputs(&mut out)? {
//!         // new camera frame in out.rgb / out.depth
//!     }
//! }
//! let report = client.terminate();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod binding;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod instance;
pub mod registry;

pub use binding::BindingStrategy;
pub use client::{ClientInterface, ClientOutputs, SimContext, SimulationClient, TeardownReport};
pub use coordinator::{CoordinatorStatus, RenderInitError};
pub use error::{SimError, SimResult};
pub use instance::SimulationInstance;
pub use registry::{Registry, RegistrySnapshot};
