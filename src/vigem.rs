/// ViGEmBus wrapper: creates virtual Xbox 360 controllers on the virtual
/// bus and submits state to them. See spec §4.6.
///
/// ViGEmBus is a virtual gamepad bus driver by Nefarius
/// (Benjamin Höglinger-Stelzer); this module wraps the `vigem-client` crate.
/// Reference: https://github.com/nefarius/ViGEmBus
use crate::device::GamepadState;
use crate::error::{PadSwitchError, Result};

#[cfg(windows)]
pub mod imp {
    use super::*;
    use std::time::Duration;

    /// Owns the connection to ViGEmBus. Virtual controllers created from it
    /// borrow a `'static`-erased reference (see `VigemClient::create`'s
    /// safety comment) and must not outlive it; the Forwarding Service
    /// enforces that by dropping all channels/targets before the client.
    pub struct VigemClient {
        inner: Box<vigem_client::Client>,
    }

    impl VigemClient {
        pub fn connect() -> Result<Self> {
            let inner = vigem_client::Client::connect().map_err(|e| {
                PadSwitchError::InfrastructureMissing(format!("ViGEmBus connect failed: {:?}", e))
            })?;
            Ok(Self {
                inner: Box::new(inner),
            })
        }

        pub fn is_installed() -> bool {
            vigem_client::Client::connect().is_ok()
        }

        /// Construct a disconnected virtual controller. Call `connect()` to
        /// plug it in before submitting state.
        pub fn create(&self) -> VirtualController {
            // SAFETY: `inner` is heap-allocated so its address is stable
            // across moves of `VigemClient` itself. Every `VirtualController`
            // this produces is owned (directly or via the channel set) by
            // the same Forwarding Service instance that owns this
            // `VigemClient`, and that service drops channels/pool before the
            // client (reverse-construction order, see forwarding_service.rs
            // drop order). No `VirtualController` outlives its `VigemClient`.
            let client_ref: &'static vigem_client::Client =
                unsafe { &*(self.inner.as_ref() as *const vigem_client::Client) };
            VirtualController {
                target: vigem_client::Xbox360Wired::new(
                    client_ref,
                    vigem_client::TargetId::XBOX360_WIRED,
                ),
                connected: false,
            }
        }
    }

    pub struct VirtualController {
        target: vigem_client::Xbox360Wired<'static>,
        connected: bool,
    }

    impl VirtualController {
        /// Retry connect up to 5 times, spaced `300 * attempt` ms.
        pub fn connect(&mut self) -> Result<()> {
            for attempt in 1..=5u32 {
                match self.target.plugin_wait() {
                    Ok(()) => {
                        self.connected = true;
                        return Ok(());
                    }
                    Err(e) => {
                        log::warn!("ViGEm plugin attempt {} failed: {:?}", attempt, e);
                        std::thread::sleep(Duration::from_millis(300 * attempt as u64));
                    }
                }
            }
            Err(PadSwitchError::VirtualCreationFailed(
                "ViGEmBus connect-retry exhausted".into(),
            ))
        }

        /// Submit one gamepad state update. No auto-submit — callers
        /// (the Forwarding Channel) call this explicitly per poll.
        pub fn submit(&mut self, state: &GamepadState) -> Result<()> {
            let xgamepad = to_xgamepad(state);
            self.target
                .update(&xgamepad)
                .map_err(|e| PadSwitchError::ViGEm(format!("submit failed: {:?}", e)))
        }

        pub fn disconnect(&mut self) {
            if self.connected {
                let _ = self.target.unplug();
                self.connected = false;
            }
        }

        pub fn is_connected(&self) -> bool {
            self.connected
        }
    }

    impl Drop for VirtualController {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Map our wire-agnostic `GamepadState` onto `vigem-client`'s XInput
    /// report. `vigem-client`'s `XButtons` helpers don't define the Guide
    /// bit (0x0400); we rely on the raw mask already carrying it (the
    /// Forwarding Channel reads it via the extended XInput state query).
    pub fn to_xgamepad(state: &GamepadState) -> vigem_client::XGamepad {
        vigem_client::XGamepad {
            buttons: vigem_client::XButtons(state.buttons),
            left_trigger: state.left_trigger,
            right_trigger: state.right_trigger,
            thumb_lx: state.thumb_lx,
            thumb_ly: state.thumb_ly,
            thumb_rx: state.thumb_rx,
            thumb_ry: state.thumb_ry,
        }
    }
}

#[cfg(not(windows))]
pub mod imp {
    use super::*;

    pub struct VigemClient;

    impl VigemClient {
        pub fn connect() -> Result<Self> {
            Err(PadSwitchError::InfrastructureMissing(
                "virtual bus is only available on Windows".into(),
            ))
        }

        pub fn is_installed() -> bool {
            false
        }

        pub fn create(&self) -> VirtualController {
            VirtualController
        }
    }

    pub struct VirtualController;

    impl VirtualController {
        pub fn connect(&mut self) -> Result<()> {
            Err(PadSwitchError::InfrastructureMissing(
                "virtual bus is only available on Windows".into(),
            ))
        }

        pub fn submit(&mut self, _state: &GamepadState) -> Result<()> {
            Ok(())
        }

        pub fn disconnect(&mut self) {}

        pub fn is_connected(&self) -> bool {
            false
        }
    }
}

#[cfg(all(test, windows))]
mod tests {
    use super::imp::to_xgamepad;
    use crate::device::{GamepadState, GUIDE_BUTTON_BIT};

    #[test]
    fn guide_bit_survives_mapping() {
        let state = GamepadState {
            buttons: GUIDE_BUTTON_BIT,
            ..Default::default()
        };
        let xgamepad = to_xgamepad(&state);
        assert_eq!(xgamepad.buttons.0 & GUIDE_BUTTON_BIT, GUIDE_BUTTON_BIT);
    }
}
