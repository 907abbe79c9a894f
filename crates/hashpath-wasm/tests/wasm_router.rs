#![cfg(target_arch = "wasm32")]
#![forbid(unsafe_code)]

use hashpath_wasm::HashPathRouter;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn rejects_ambiguous_join() {
    assert!(HashPathRouter::new(r#"{"join":"-"}"#).is_err());
}

#[wasm_bindgen_test]
fn starts_and_reports_state() {
    let router = HashPathRouter::new("").expect("default config");
    router.start().expect("listeners installed");
    // Second start is a no-op.
    router.start().expect("idempotent start");

    let state = router.current_state_json().expect("core idle after load");
    assert!(state.contains("\"section\""), "unexpected state {state}");
    router.stop();
}
