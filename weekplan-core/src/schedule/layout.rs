//! Side-by-side column layout for one day's overlapping items.

use serde::Serialize;

/// Something occupying `[start_minutes, end_minutes)` on a day.
pub trait Interval {
    fn start_minutes(&self) -> u32;
    fn end_minutes(&self) -> u32;
}

/// An item with its assigned column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement<T> {
    pub item: T,
    pub column: usize,
    /// Columns used by the item's overlap group.
    pub total_columns: usize,
}

/// Assign columns to a day's items.
///
/// Items are sorted by start and split into maximal groups of transitively
/// overlapping items; a new group starts when an item begins at or after
/// the running end of the current group. Within a group each item goes to
/// the lowest column whose items all end by the time it starts, so a pair
/// that merely touches shares a column instead of splitting the width.
pub fn layout_day<T: Interval>(mut items: Vec<T>) -> Vec<Placement<T>> {
    items.sort_by_key(|i| (i.start_minutes(), i.end_minutes()));

    let mut placed = Vec::with_capacity(items.len());
    let mut group_start = 0;
    let mut group_end = 0;
    // End minute of the last item in each column of the current group.
    let mut column_ends: Vec<u32> = Vec::new();

    for item in items {
        let start = item.start_minutes();
        let end = item.end_minutes().max(start);

        if !column_ends.is_empty() && start >= group_end {
            close_group(&mut placed[group_start..], column_ends.len());
            group_start = placed.len();
            column_ends.clear();
        }

        let column = match column_ends.iter().position(|&col_end| col_end <= start) {
            Some(column) => {
                column_ends[column] = end;
                column
            }
            None => {
                column_ends.push(end);
                column_ends.len() - 1
            }
        };

        group_end = if placed.len() == group_start {
            end
        } else {
            group_end.max(end)
        };

        placed.push(Placement {
            item,
            column,
            total_columns: 0,
        });
    }

    close_group(&mut placed[group_start..], column_ends.len());
    placed
}

fn close_group<T>(group: &mut [Placement<T>], total_columns: usize) {
    for placement in group {
        placement.total_columns = total_columns;
    }
}
