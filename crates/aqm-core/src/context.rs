//! Device-aware tier selection.
//!
//! A stateless, total policy mapping a snapshot of device conditions to the
//! coin tier a send should prefer. The caller still goes through inventory
//! selection, which falls back downward when the preferred tier is empty.
//!
//! Decision table, evaluated top-down:
//!
//! ```text
//! battery < 5%                    -> BRONZE
//! no wifi, signal < -100 dBm      -> BRONZE
//! no wifi, signal >= -100 dBm     -> SILVER
//! wifi, battery < 20%             -> BRONZE
//! wifi, 20% <= battery < 50%      -> SILVER
//! wifi, battery >= 50%            -> GOLD
//! ```

use crate::tier::Tier;

/// Snapshot of device state at message-send time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceContext {
    /// Battery level, 0.0 to 100.0.
    pub battery_pct: f32,
    /// True when connected to wifi.
    pub has_wifi: bool,
    /// Cellular signal strength in dBm (more negative is weaker). Ignored
    /// while on wifi.
    pub signal_dbm: f32,
}

/// Preferred coin tier for the given device state.
pub fn select_tier(ctx: &DeviceContext) -> Tier {
    // Critical battery always conserves, regardless of link.
    if ctx.battery_pct < 5.0 {
        return Tier::Bronze;
    }

    if !ctx.has_wifi {
        if ctx.signal_dbm < -100.0 {
            return Tier::Bronze;
        }
        return Tier::Silver;
    }

    if ctx.battery_pct < 20.0 {
        return Tier::Bronze;
    }
    if ctx.battery_pct < 50.0 {
        return Tier::Silver;
    }
    Tier::Gold
}

/// True when conditions are good enough for background maintenance
/// (inventory refill, purge sweeps): on wifi with battery above 20%.
pub fn is_maintenance_window(ctx: &DeviceContext) -> bool {
    ctx.has_wifi && ctx.battery_pct > 20.0
}
