//! Reply keyboard offered while tags can be attached to a fresh entry

use crate::command::DONE;
use crate::models::Tag;

const ROW_WIDTH: usize = 3;

/// Owner's tag names (first occurrence wins) followed by `Done`, three per row
pub fn attach_keyboard(tags: &[Tag]) -> Vec<Vec<String>> {
    let mut labels: Vec<String> = Vec::with_capacity(tags.len() + 1);
    for tag in tags {
        if !labels.contains(&tag.name) {
            labels.push(tag.name.clone());
        }
    }
    labels.push(DONE.to_string());

    labels.chunks(ROW_WIDTH).map(|row| row.to_vec()).collect()
}
