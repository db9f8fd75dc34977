pub mod cab_panel;
pub mod header;
pub mod help_overlay;
pub mod info_overlay;
pub mod loco_list;
pub mod switch_grid;
