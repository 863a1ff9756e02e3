#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::Row;
use sqlsession_core::{
    Config, DataSource, Entity, MappingCatalog, SessionFactory, SessionManager,
    StatelessSessionManager, TransactionScope,
};
use std::sync::Arc;
use tempfile::TempDir;

pub const CATALOG: &str = "music";

const SCHEMA_SQL: &str = r#"
CREATE TABLE MediaType (MediaTypeId INTEGER PRIMARY KEY, Name TEXT);
CREATE TABLE Genre (GenreId INTEGER PRIMARY KEY, Name TEXT);
CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name TEXT);
CREATE TABLE Album (
    AlbumId INTEGER PRIMARY KEY,
    Title TEXT NOT NULL,
    ArtistId INTEGER NOT NULL REFERENCES Artist(ArtistId)
);
CREATE TABLE Track (
    TrackId INTEGER PRIMARY KEY,
    Name TEXT NOT NULL,
    AlbumId INTEGER REFERENCES Album(AlbumId),
    MediaTypeId INTEGER NOT NULL REFERENCES MediaType(MediaTypeId),
    GenreId INTEGER REFERENCES Genre(GenreId),
    Composer TEXT,
    Milliseconds INTEGER NOT NULL,
    UnitPrice REAL NOT NULL
);
CREATE TABLE Employee (
    EmployeeId INTEGER PRIMARY KEY,
    LastName TEXT NOT NULL,
    FirstName TEXT NOT NULL,
    Title TEXT,
    Email TEXT,
    Country TEXT
);
CREATE TABLE Customer (
    CustomerId INTEGER PRIMARY KEY,
    FirstName TEXT NOT NULL,
    LastName TEXT NOT NULL,
    Email TEXT NOT NULL,
    State TEXT,
    Country TEXT
);
CREATE TABLE Invoice (
    InvoiceId INTEGER PRIMARY KEY,
    CustomerId INTEGER NOT NULL REFERENCES Customer(CustomerId),
    InvoiceDate TEXT NOT NULL,
    BillingCountry TEXT,
    Total REAL NOT NULL
);
CREATE TABLE InvoiceLine (
    InvoiceLineId INTEGER PRIMARY KEY,
    InvoiceId INTEGER NOT NULL REFERENCES Invoice(InvoiceId),
    TrackId INTEGER NOT NULL,
    UnitPrice REAL NOT NULL,
    Quantity INTEGER NOT NULL
);
CREATE TABLE PlaylistTrack (
    PlaylistTrackId INTEGER PRIMARY KEY,
    PlaylistId INTEGER NOT NULL,
    TrackId INTEGER NOT NULL
);
CREATE TABLE Review (
    ReviewId INTEGER PRIMARY KEY,
    AlbumId INTEGER NOT NULL REFERENCES Album(AlbumId) DEFERRABLE INITIALLY DEFERRED,
    Body TEXT NOT NULL
);

INSERT INTO MediaType (MediaTypeId, Name) VALUES
    (1, 'MPEG audio file'),
    (2, 'Protected AAC audio file'),
    (3, 'Protected MPEG-4 video file'),
    (4, 'Purchased AAC audio file'),
    (5, 'AAC audio file');

INSERT INTO Genre (GenreId, Name) VALUES
    (1, 'Rock'),
    (2, 'Jazz'),
    (3, 'Metal'),
    (4, 'Alternative & Punk'),
    (5, 'Rock And Roll'),
    (6, 'Blues');

INSERT INTO Artist (ArtistId, Name) VALUES
    (1, 'AC/DC'),
    (2, 'Accept'),
    (84, 'Foo Fighters');

INSERT INTO Album (AlbumId, Title, ArtistId) VALUES
    (1, 'For Those About To Rock We Salute You', 1),
    (2, 'Balls to the Wall', 2),
    (3, 'Restless and Wild', 2),
    (81, 'One By One', 84);

INSERT INTO Track (TrackId, Name, AlbumId, MediaTypeId, GenreId, Composer, Milliseconds, UnitPrice) VALUES
    (1, 'For Those About To Rock (We Salute You)', 1, 1, 1, 'Angus Young, Malcolm Young, Brian Johnson', 343719, 0.99),
    (2, 'Balls to the Wall', 2, 2, 1, NULL, 342562, 0.99),
    (3, 'Fast As a Shark', 3, 2, 1, 'F. Baltes, S. Kaufman, U. Dirkscneider & W. Hoffman', 230619, 0.99),
    (4, 'Restless and Wild', 3, 2, 1, 'F. Baltes, R.A. Smith-Diesel, S. Kaufman, U. Dirkscneider & W. Hoffman', 252051, 0.99),
    (5, 'Put The Finger On You', 1, 1, 1, 'Angus Young, Malcolm Young, Brian Johnson', 205662, 0.99),
    (1000, 'All My Life', 81, 1, 1, 'Foo Fighters', 263653, 0.99),
    (1001, 'Low', 81, 1, 1, 'Foo Fighters', 268120, 0.99),
    (1002, 'Have It All', 81, 1, 1, 'Foo Fighters', 298324, 0.99),
    (1003, 'Times Like These', 81, 1, 1, 'Foo Fighters', 266866, 0.99),
    (1004, 'Disenchanted Lullaby', 81, 1, 1, 'Foo Fighters', 273528, 0.99),
    (1005, 'Tired Of You', 81, 1, 1, 'Foo Fighters', 311353, 0.99),
    (1006, 'Halo', 81, 1, 1, 'Foo Fighters', 306442, 0.99),
    (1007, 'Lonely As You', 81, 1, 1, 'Foo Fighters', 277185, 0.99),
    (1008, 'Overdrive', 81, 1, 1, 'Foo Fighters', 270550, 0.99),
    (1009, 'Burn Away', 81, 1, 1, 'Foo Fighters', 298161, 0.99),
    (1010, 'Come Back', 81, 1, 1, 'Foo Fighters', 469968, 0.99);

INSERT INTO Employee (EmployeeId, LastName, FirstName, Title, Email, Country) VALUES
    (1, 'Adams', 'Andrew', 'General Manager', 'andrew@chinookcorp.com', 'Canada'),
    (2, 'Edwards', 'Nancy', 'Sales Manager', 'nancy@chinookcorp.com', 'Canada'),
    (6, 'Mitchell', 'Michael', 'IT Manager', 'michael@chinookcorp.com', 'Canada'),
    (7, 'King', 'Robert', 'IT Staff', 'robert@chinookcorp.com', 'Canada');

INSERT INTO Customer (CustomerId, FirstName, LastName, Email, State, Country) VALUES
    (2, 'Leonie', 'Koehler', 'leonekohler@surfeu.de', NULL, 'Germany'),
    (16, 'Frank', 'Harris', 'fharris@google.com', 'CA', 'USA'),
    (28, 'Julia', 'Barnett', 'jubarnett@gmail.com', 'UT', 'USA'),
    (36, 'Hannah', 'Schneider', 'hannah.schneider@yahoo.de', NULL, 'Germany');

INSERT INTO Invoice (InvoiceId, CustomerId, InvoiceDate, BillingCountry, Total) VALUES
    (1, 2, '2009-01-01', 'Germany', 1.98),
    (2, 36, '2009-01-02', 'Germany', 3.96),
    (3, 36, '2009-01-03', 'Germany', 5.94),
    (11, 28, '2009-02-06', 'USA', 8.91),
    (12, 16, '2009-02-11', 'USA', 13.86);

INSERT INTO InvoiceLine (InvoiceId, TrackId, UnitPrice, Quantity)
WITH RECURSIVE seq(k) AS (SELECT 0 UNION ALL SELECT k + 1 FROM seq WHERE k < 13)
SELECT 1, 1 + k, 0.99, 1 FROM seq WHERE k < 2
UNION ALL SELECT 2, 3 + k, 0.99, 1 FROM seq WHERE k < 4
UNION ALL SELECT 3, 7 + k * 2, 0.99, 1 FROM seq WHERE k < 6
UNION ALL SELECT 11, 250 + k * 9, 0.99, 1 FROM seq WHERE k < 9
UNION ALL SELECT 12, 331 + k * 9, 0.99, 1 FROM seq;

INSERT INTO PlaylistTrack (PlaylistId, TrackId)
WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 3290)
SELECT 8, n FROM seq;

INSERT INTO PlaylistTrack (PlaylistId, TrackId) VALUES (1, 1000), (1, 1001), (1, 1002);
"#;

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn opt_text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl Entity for MediaType {
    type Id = i64;
    const TABLE: &'static str = "MediaType";
    const ID_COLUMN: &'static str = "MediaTypeId";
    const COLUMNS: &'static [&'static str] = &["Name"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![opt_text(&self.name)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl Genre {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
        }
    }
}

impl Entity for Genre {
    type Id = i64;
    const TABLE: &'static str = "Genre";
    const ID_COLUMN: &'static str = "GenreId";
    const COLUMNS: &'static [&'static str] = &["Name"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![opt_text(&self.name)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl Artist {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
        }
    }
}

impl Entity for Artist {
    type Id = i64;
    const TABLE: &'static str = "Artist";
    const ID_COLUMN: &'static str = "ArtistId";
    const COLUMNS: &'static [&'static str] = &["Name"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![opt_text(&self.name)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: Option<i64>,
    pub name: String,
    pub album_id: Option<i64>,
    pub media_type_id: i64,
    pub genre_id: Option<i64>,
    pub composer: Option<String>,
    pub milliseconds: i64,
    pub unit_price: f64,
}

impl Entity for Track {
    type Id = i64;
    const TABLE: &'static str = "Track";
    const ID_COLUMN: &'static str = "TrackId";
    const COLUMNS: &'static [&'static str] = &[
        "Name",
        "AlbumId",
        "MediaTypeId",
        "GenreId",
        "Composer",
        "Milliseconds",
        "UnitPrice",
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            opt_int(self.album_id),
            Value::Integer(self.media_type_id),
            opt_int(self.genre_id),
            opt_text(&self.composer),
            Value::Integer(self.milliseconds),
            Value::Real(self.unit_price),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            album_id: row.get(2)?,
            media_type_id: row.get(3)?,
            genre_id: row.get(4)?,
            composer: row.get(5)?,
            milliseconds: row.get(6)?,
            unit_price: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: Option<i64>,
    pub last_name: String,
    pub first_name: String,
    pub title: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
}

impl Entity for Employee {
    type Id = i64;
    const TABLE: &'static str = "Employee";
    const ID_COLUMN: &'static str = "EmployeeId";
    const COLUMNS: &'static [&'static str] =
        &["LastName", "FirstName", "Title", "Email", "Country"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.last_name.clone()),
            Value::Text(self.first_name.clone()),
            opt_text(&self.title),
            opt_text(&self.email),
            opt_text(&self.country),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            last_name: row.get(1)?,
            first_name: row.get(2)?,
            title: row.get(3)?,
            email: row.get(4)?,
            country: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Entity for Customer {
    type Id = i64;
    const TABLE: &'static str = "Customer";
    const ID_COLUMN: &'static str = "CustomerId";
    const COLUMNS: &'static [&'static str] = &["FirstName", "LastName", "Email", "State", "Country"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.first_name.clone()),
            Value::Text(self.last_name.clone()),
            Value::Text(self.email.clone()),
            opt_text(&self.state),
            opt_text(&self.country),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            state: row.get(4)?,
            country: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: Option<i64>,
    pub customer_id: i64,
    pub invoice_date: String,
    pub billing_country: Option<String>,
    pub total: f64,
}

impl Entity for Invoice {
    type Id = i64;
    const TABLE: &'static str = "Invoice";
    const ID_COLUMN: &'static str = "InvoiceId";
    const COLUMNS: &'static [&'static str] =
        &["CustomerId", "InvoiceDate", "BillingCountry", "Total"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.customer_id),
            Value::Text(self.invoice_date.clone()),
            opt_text(&self.billing_country),
            Value::Real(self.total),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            invoice_date: row.get(2)?,
            billing_country: row.get(3)?,
            total: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLine {
    pub id: Option<i64>,
    pub invoice_id: i64,
    pub track_id: i64,
    pub unit_price: f64,
    pub quantity: i64,
}

impl Entity for InvoiceLine {
    type Id = i64;
    const TABLE: &'static str = "InvoiceLine";
    const ID_COLUMN: &'static str = "InvoiceLineId";
    const COLUMNS: &'static [&'static str] = &["InvoiceId", "TrackId", "UnitPrice", "Quantity"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.invoice_id),
            Value::Integer(self.track_id),
            Value::Real(self.unit_price),
            Value::Integer(self.quantity),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            track_id: row.get(2)?,
            unit_price: row.get(3)?,
            quantity: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistTrack {
    pub id: Option<i64>,
    pub playlist_id: i64,
    pub track_id: i64,
}

impl Entity for PlaylistTrack {
    type Id = i64;
    const TABLE: &'static str = "PlaylistTrack";
    const ID_COLUMN: &'static str = "PlaylistTrackId";
    const COLUMNS: &'static [&'static str] = &["PlaylistId", "TrackId"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.playlist_id),
            Value::Integer(self.track_id),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            playlist_id: row.get(1)?,
            track_id: row.get(2)?,
        })
    }
}

/// Album review; its album reference is only checked at commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: Option<i64>,
    pub album_id: i64,
    pub body: String,
}

impl Entity for Review {
    type Id = i64;
    const TABLE: &'static str = "Review";
    const ID_COLUMN: &'static str = "ReviewId";
    const COLUMNS: &'static [&'static str] = &["AlbumId", "Body"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_generated_id(&mut self, rowid: i64) {
        self.id = Some(rowid);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.album_id),
            Value::Text(self.body.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            album_id: row.get(1)?,
            body: row.get(2)?,
        })
    }
}

/// Catalog mapping every fixture entity except `Album`.
pub fn music_catalog() -> MappingCatalog {
    MappingCatalog::new(CATALOG)
        .with_entity::<MediaType>()
        .with_entity::<Genre>()
        .with_entity::<Artist>()
        .with_entity::<Track>()
        .with_entity::<Employee>()
        .with_entity::<Customer>()
        .with_entity::<Invoice>()
        .with_entity::<InvoiceLine>()
        .with_entity::<PlaylistTrack>()
        .with_entity::<Review>()
        .with_schema(SCHEMA_SQL)
}

pub struct Fixture {
    _dir: TempDir,
    pub factory: Arc<SessionFactory>,
    pub manager: Arc<SessionManager>,
    pub stateless: Arc<StatelessSessionManager>,
}

/// Seeded file-backed database with both managers over one factory.
pub fn fixture(scope: TransactionScope) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let data_source = DataSource::File(dir.path().join("music.sqlite3"));
    let factory = Arc::new(
        SessionFactory::build(Config::new(CATALOG, scope), data_source, [music_catalog()])
            .unwrap(),
    );

    Fixture {
        _dir: dir,
        manager: Arc::new(SessionManager::new(Arc::clone(&factory))),
        stateless: Arc::new(StatelessSessionManager::new(Arc::clone(&factory))),
        factory,
    }
}
