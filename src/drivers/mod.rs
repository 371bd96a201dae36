pub mod claw;
pub mod dualsense;
pub mod legion_go;
pub mod steam_deck;
