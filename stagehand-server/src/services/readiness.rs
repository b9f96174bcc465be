//! Performance readiness: done tasks and ready items against what is required

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use stagehand_common::{time, Result};

use crate::db::performances::{self, ReadinessTask, RequiredItem};
use crate::services::workflow::ItemStatus;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissingItem {
    pub item_id: i64,
    pub inventory_number: String,
    pub name: String,
    pub status: ItemStatus,
    pub required: i64,
    pub available: i64,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Readiness {
    pub performance_id: i64,
    pub tasks_total: i64,
    pub tasks_done: i64,
    pub overdue_tasks: i64,
    pub items_total: i64,
    pub items_ready: i64,
    pub missing_items: Vec<MissingItem>,
    pub percent: i64,
    pub is_ready: bool,
}

/// Summarize tasks and required items as of `today`
///
/// With nothing to track the performance is 0% and not ready.
pub fn summarize(
    performance_id: i64,
    tasks: &[ReadinessTask],
    items: &[RequiredItem],
    today: NaiveDate,
) -> Readiness {
    let tasks_total = tasks.len() as i64;
    let tasks_done = tasks.iter().filter(|t| t.is_done).count() as i64;
    let overdue_tasks = tasks
        .iter()
        .filter(|t| !t.is_done && t.due_date.is_some_and(|due| due < today))
        .count() as i64;

    let missing_items: Vec<MissingItem> = items
        .iter()
        .filter(|item| !item.is_ready())
        .map(|item| MissingItem {
            item_id: item.item_id,
            inventory_number: item.inventory_number.clone(),
            name: item.name.clone(),
            status: item.status,
            required: item.quantity,
            available: item.available(),
            is_deleted: item.is_deleted,
        })
        .collect();

    let items_total = items.len() as i64;
    let items_ready = items_total - missing_items.len() as i64;

    let total = tasks_total + items_total;
    let percent = if total == 0 {
        0
    } else {
        (100.0 * (tasks_done + items_ready) as f64 / total as f64).round() as i64
    };

    Readiness {
        performance_id,
        tasks_total,
        tasks_done,
        overdue_tasks,
        items_total,
        items_ready,
        missing_items,
        percent,
        is_ready: total > 0 && percent == 100,
    }
}

pub async fn performance_readiness(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
) -> Result<Readiness> {
    let tasks = performances::list_tasks(pool, theater_id, performance_id).await?;
    let items = performances::list_required_items(pool, theater_id, performance_id).await?;
    Ok(summarize(performance_id, &tasks, &items, time::today()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(is_done: bool, due_date: Option<NaiveDate>) -> ReadinessTask {
        ReadinessTask {
            id: 1,
            performance_id: 1,
            title: "Fit costumes".into(),
            department_id: None,
            due_date,
            is_done,
            done_at: None,
            created_at: time::now(),
        }
    }

    fn item(status: ItemStatus, stock: i64, required: i64) -> RequiredItem {
        RequiredItem {
            item_id: 1,
            inventory_number: "INV-1".into(),
            name: "Crown".into(),
            status,
            stock_quantity: stock,
            quantity: required,
            note: None,
            is_deleted: false,
        }
    }

    #[test]
    fn test_nothing_tracked_is_not_ready() {
        let r = summarize(1, &[], &[], date(2025, 5, 1));
        assert_eq!(r.percent, 0);
        assert!(!r.is_ready);
    }

    #[test]
    fn test_everything_done_is_ready() {
        let r = summarize(
            1,
            &[task(true, None)],
            &[item(ItemStatus::Reserved, 2, 2)],
            date(2025, 5, 1),
        );
        assert_eq!(r.percent, 100);
        assert!(r.is_ready);
        assert!(r.missing_items.is_empty());
    }

    #[test]
    fn test_percent_rounds_and_counts_missing() {
        let tasks = [
            task(true, None),
            task(false, Some(date(2025, 4, 30))),
            task(false, Some(date(2025, 5, 1))),
        ];
        let items = [
            item(ItemStatus::InRepair, 5, 1),
            item(ItemStatus::Available, 1, 3),
            item(ItemStatus::InUse, 3, 3),
        ];

        let r = summarize(9, &tasks, &items, date(2025, 5, 1));
        assert_eq!(r.tasks_total, 3);
        assert_eq!(r.tasks_done, 1);
        assert_eq!(r.overdue_tasks, 1);
        assert_eq!(r.items_total, 3);
        assert_eq!(r.items_ready, 1);
        // 2 of 6
        assert_eq!(r.percent, 33);
        assert!(!r.is_ready);

        assert_eq!(r.missing_items.len(), 2);
        assert_eq!(r.missing_items[0].available, 0);
        assert_eq!(r.missing_items[1].available, 1);
        assert_eq!(r.missing_items[1].required, 3);
    }

    #[test]
    fn test_deleted_item_is_missing() {
        let mut gone = item(ItemStatus::Available, 4, 1);
        gone.is_deleted = true;

        let r = summarize(1, &[task(true, None)], &[gone], date(2025, 5, 1));
        assert_eq!(r.items_total, 1);
        assert_eq!(r.items_ready, 0);
        assert_eq!(r.percent, 50);
        assert!(!r.is_ready);
        assert_eq!(r.missing_items[0].available, 0);
        assert!(r.missing_items[0].is_deleted);
    }
}
