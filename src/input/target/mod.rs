//! Virtual controllers presented to the host
pub mod dualsense;
pub mod steam_deck;
pub mod uinput;

/// Destroy every virtual controller kept alive in the caches
pub fn close_cached() {
    dualsense::close_cached();
    uinput::close_cached();
}
