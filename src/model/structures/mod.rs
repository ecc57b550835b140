pub mod game_mode;
pub mod privileges;
pub mod ranked_status;
