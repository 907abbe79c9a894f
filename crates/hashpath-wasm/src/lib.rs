#![forbid(unsafe_code)]

//! Browser host for `hashpath-core`.
//!
//! [`HashPathRouter`] is a `wasm-bindgen`-exported struct that installs the
//! document listeners (capture-phase click, `hashchange`, `popstate`,
//! `scroll`), a section `MutationObserver` and a single `setTimeout`, feeds
//! them to the router and executes the returned commands against
//! `location`, `history` and `window.scrollTo`.
//!
//! ```js
//! import init, { HashPathRouter } from "./hashpath_wasm.js";
//! await init();
//! const router = new HashPathRouter(JSON.stringify({ join: "--" }));
//! router.start();
//! ```

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::HashPathRouter;

// Host core is used by the wasm module and by native tests.
#[cfg(any(target_arch = "wasm32", test))]
mod host_core;
