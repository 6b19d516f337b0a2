//! In-process table client with the remote API's observable behavior: single-row reads fail with
//! `PGRST116` on zero rows, duplicate primary keys fail with `23505`, stored rows are returned.

#![allow(dead_code)]

use async_trait::async_trait;
use scck_erp_store::{Conditions, Record, StorageError, TableClient, TableQuery, NO_ROWS_CODE};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryTables {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    calls: AtomicUsize,
}

pub fn record(v: Value) -> Record {
    match v {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Record>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    /// Requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn conditions(query: &TableQuery) -> Conditions {
    query.filters.iter().cloned().collect()
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn project(row: &Record, select: &str) -> Record {
    if select == "*" {
        return row.clone();
    }
    select
        .split(',')
        .filter_map(|c| row.get(c).map(|v| (c.to_string(), v.clone())))
        .collect()
}

fn not_found() -> StorageError {
    StorageError::Remote {
        status: 406,
        code: Some(NO_ROWS_CODE.to_string()),
        message: "JSON object requested, multiple (or no) rows returned".to_string(),
    }
}

fn duplicate(table: &str, id: &Value) -> StorageError {
    StorageError::Remote {
        status: 409,
        code: Some("23505".to_string()),
        message: format!("duplicate key value violates unique constraint \"{}_pkey\" ({})", table, id),
    }
}

impl MemoryTables {
    fn query_rows(&self, query: &TableQuery) -> Vec<Record> {
        let filter = conditions(query);
        let mut rows: Vec<Record> = self
            .rows(&query.table)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.field), b.get(&order.field));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        let (skip, take) = match (query.range, query.limit) {
            (Some((from, to)), _) => (from as usize, (to - from + 1) as usize),
            (None, Some(n)) => (0, n as usize),
            (None, None) => (0, usize::MAX),
        };
        rows.into_iter()
            .skip(skip)
            .take(take)
            .map(|r| project(&r, &query.select))
            .collect()
    }
}

#[async_trait]
impl TableClient for MemoryTables {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Record>, StorageError> {
        self.hit();
        Ok(self.query_rows(query))
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Record, StorageError> {
        self.hit();
        let mut rows = self.query_rows(query);
        if rows.len() != 1 {
            return Err(not_found());
        }
        Ok(rows.remove(0))
    }

    async fn insert(
        &self,
        table: &str,
        rows: &[Record],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Record>, StorageError> {
        self.hit();
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table.to_string()).or_default();
        let key = on_conflict.unwrap_or("id");

        if on_conflict.is_none() {
            for row in rows {
                if let Some(id) = row.get("id") {
                    if stored.iter().any(|r| r.get("id") == Some(id)) {
                        return Err(duplicate(table, id));
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = row.clone();
            if !row.contains_key("id") {
                let next = stored
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
                    + 1;
                row.insert("id".to_string(), Value::from(next));
            }
            let existing = match on_conflict {
                Some(_) => row
                    .get(key)
                    .and_then(|k| stored.iter().position(|r| r.get(key) == Some(k))),
                None => None,
            };
            match existing {
                Some(i) => {
                    for (k, v) in row {
                        stored[i].insert(k, v);
                    }
                    out.push(stored[i].clone());
                }
                None => {
                    stored.push(row.clone());
                    out.push(row);
                }
            }
        }
        Ok(out)
    }

    async fn update(&self, query: &TableQuery, changes: &Record) -> Result<Vec<Record>, StorageError> {
        self.hit();
        let filter = conditions(query);
        let mut tables = self.tables.lock().unwrap();
        let mut out = Vec::new();
        if let Some(stored) = tables.get_mut(&query.table) {
            for row in stored.iter_mut().filter(|r| filter.matches(r)) {
                for (k, v) in changes {
                    row.insert(k.clone(), v.clone());
                }
                out.push(row.clone());
            }
        }
        Ok(out)
    }

    async fn delete(&self, query: &TableQuery) -> Result<(), StorageError> {
        self.hit();
        let filter = conditions(query);
        if let Some(stored) = self.tables.lock().unwrap().get_mut(&query.table) {
            stored.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    async fn count(&self, query: &TableQuery) -> Result<u64, StorageError> {
        self.hit();
        let filter = conditions(query);
        Ok(self.rows(&query.table).iter().filter(|r| filter.matches(r)).count() as u64)
    }
}
