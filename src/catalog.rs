//! ERP table catalog and local DDL. Every statement is `IF NOT EXISTS`, so bootstrap runs on each start.

use crate::id::{DEFAULT_ID_WIDTH, LEDGER_ID_WIDTH};
use sqlx::SqliteConnection;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Producers,
    Collections,
    Transactions,
    Inventory,
    Employees,
    Customers,
    Suppliers,
    Projects,
}

impl Table {
    /// Creation order: referenced tables first.
    pub const ALL: [Table; 9] = [
        Table::Users,
        Table::Producers,
        Table::Collections,
        Table::Transactions,
        Table::Inventory,
        Table::Employees,
        Table::Customers,
        Table::Suppliers,
        Table::Projects,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Producers => "producers",
            Table::Collections => "collections",
            Table::Transactions => "transactions",
            Table::Inventory => "inventory",
            Table::Employees => "employees",
            Table::Customers => "customers",
            Table::Suppliers => "suppliers",
            Table::Projects => "projects",
        }
    }

    /// Prefix and pad width for generated ids. `users` has an integer surrogate key instead.
    pub fn id_format(&self) -> Option<(&'static str, usize)> {
        match self {
            Table::Users => None,
            Table::Producers => Some(("PROD", DEFAULT_ID_WIDTH)),
            Table::Collections => Some(("COLL", LEDGER_ID_WIDTH)),
            Table::Transactions => Some(("TXN", LEDGER_ID_WIDTH)),
            Table::Inventory => Some(("INV", DEFAULT_ID_WIDTH)),
            Table::Employees => Some(("EMP", DEFAULT_ID_WIDTH)),
            Table::Customers => Some(("CUST", DEFAULT_ID_WIDTH)),
            Table::Suppliers => Some(("SUPP", DEFAULT_ID_WIDTH)),
            Table::Projects => Some(("PROJ", DEFAULT_ID_WIDTH)),
        }
    }

    /// Ledger tables are append-mostly and carry no `updated_at` column.
    pub fn has_updated_at(&self) -> bool {
        !matches!(self, Table::Collections | Table::Transactions)
    }

    fn ddl(&self) -> &'static str {
        match self {
            Table::Users => {
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY,
                    email TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    name TEXT NOT NULL,
                    role TEXT NOT NULL,
                    department TEXT,
                    avatar TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
            Table::Producers => {
                r#"
                CREATE TABLE IF NOT EXISTS producers (
                    id TEXT PRIMARY KEY,
                    nom TEXT NOT NULL,
                    zone TEXT NOT NULL,
                    superficie REAL,
                    statut TEXT DEFAULT 'Active',
                    telephone TEXT,
                    email TEXT,
                    adresse TEXT,
                    date_inscription DATETIME,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
            Table::Collections => {
                r#"
                CREATE TABLE IF NOT EXISTS collections (
                    id TEXT PRIMARY KEY,
                    producer_id TEXT NOT NULL,
                    date DATETIME NOT NULL,
                    quantite REAL NOT NULL,
                    qualite TEXT,
                    prix_unitaire REAL,
                    total REAL,
                    statut TEXT DEFAULT 'Recorded',
                    notes TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    FOREIGN KEY(producer_id) REFERENCES producers(id)
                )
                "#
            }
            Table::Transactions => {
                r#"
                CREATE TABLE IF NOT EXISTS transactions (
                    id TEXT PRIMARY KEY,
                    date DATETIME NOT NULL,
                    compte TEXT,
                    description TEXT NOT NULL,
                    debit REAL DEFAULT 0,
                    credit REAL DEFAULT 0,
                    balance REAL,
                    type TEXT,
                    reference_id TEXT,
                    user_id INTEGER,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    FOREIGN KEY(user_id) REFERENCES users(id)
                )
                "#
            }
            Table::Inventory => {
                r#"
                CREATE TABLE IF NOT EXISTS inventory (
                    id TEXT PRIMARY KEY,
                    nom TEXT NOT NULL,
                    quantite REAL NOT NULL,
                    unite TEXT,
                    valeur REAL,
                    min_stock REAL,
                    max_stock REAL,
                    localisation TEXT,
                    statut TEXT DEFAULT 'In Stock',
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
            Table::Employees => {
                r#"
                CREATE TABLE IF NOT EXISTS employees (
                    id TEXT PRIMARY KEY,
                    nom TEXT NOT NULL,
                    poste TEXT,
                    departement TEXT,
                    contrat TEXT,
                    salaire REAL,
                    date_embauche DATETIME,
                    statut TEXT DEFAULT 'Active',
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
            Table::Customers => {
                r#"
                CREATE TABLE IF NOT EXISTS customers (
                    id TEXT PRIMARY KEY,
                    nom TEXT NOT NULL,
                    contact TEXT,
                    telephone TEXT,
                    email TEXT,
                    adresse TEXT,
                    ca REAL,
                    pays TEXT,
                    statut TEXT DEFAULT 'Active',
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
            Table::Suppliers => {
                r#"
                CREATE TABLE IF NOT EXISTS suppliers (
                    id TEXT PRIMARY KEY,
                    nom TEXT NOT NULL,
                    contact TEXT,
                    telephone TEXT,
                    email TEXT,
                    specialite TEXT,
                    paiement TEXT,
                    statut TEXT DEFAULT 'Active',
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
            Table::Projects => {
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id TEXT PRIMARY KEY,
                    nom TEXT NOT NULL,
                    description TEXT,
                    budget REAL,
                    depense REAL DEFAULT 0,
                    progression REAL DEFAULT 0,
                    statut TEXT DEFAULT 'Planned',
                    date_debut DATETIME,
                    date_fin DATETIME,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#
            }
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown table: {}", s))
    }
}

/// Secondary indexes for the filters callers use (zone, statut, producer, date, type, departement, pays).
const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_producers_zone ON producers(zone)",
    "CREATE INDEX IF NOT EXISTS idx_producers_statut ON producers(statut)",
    "CREATE INDEX IF NOT EXISTS idx_collections_producer ON collections(producer_id)",
    "CREATE INDEX IF NOT EXISTS idx_collections_date ON collections(date)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(type)",
    "CREATE INDEX IF NOT EXISTS idx_employees_departement ON employees(departement)",
    "CREATE INDEX IF NOT EXISTS idx_customers_pays ON customers(pays)",
];

/// Create every catalog table and index that does not exist yet.
pub async fn ensure_tables(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for table in Table::ALL {
        sqlx::query(table.ddl()).execute(&mut *conn).await?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    tracing::debug!(tables = Table::ALL.len(), indexes = INDEXES.len(), "catalog ensured");
    Ok(())
}
