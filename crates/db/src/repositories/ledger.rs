//! PostgreSQL journal.
//!
//! Each write runs in one database transaction, so an entry and its lines
//! become visible together. The partial unique index
//! `uq_journal_entries_idempotency` is what makes double-posting impossible
//! under concurrency; the lookups here only turn its violation into a typed
//! error.

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use saldo_core::ledger::validation::ensure_balanced;
use saldo_core::ledger::{
    AccountLine, EntryStatus as LedgerStatus, EntryTotals, EntryTotalsCheck, IdempotencyKey,
    JournalEntry, JournalLine, LedgerError, LedgerStore, NewJournalEntry, VoidedEntry,
};
use saldo_shared::types::{AccountId, JournalEntryId, JournalLineId};
use sea_orm::sea_query::{Expr, NullOrdering, Order};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

use super::{storage_err, violates};
use crate::entities::{journal_entries, journal_lines, sea_orm_active_enums::EntryStatus};

const IDEMPOTENCY_INDEX: &str = "uq_journal_entries_idempotency";

#[derive(Debug, FromQueryResult)]
struct SequenceRow {
    value: i64,
}

#[derive(Debug, FromQueryResult)]
struct AccountLineRow {
    entry_id: Uuid,
    line_id: Uuid,
    posted_at: Option<DateTime<chrono::FixedOffset>>,
    debit: Decimal,
    credit: Decimal,
}

impl From<AccountLineRow> for AccountLine {
    fn from(row: AccountLineRow) -> Self {
        Self {
            entry_id: JournalEntryId::from_uuid(row.entry_id),
            line_id: JournalLineId::from_uuid(row.line_id),
            posted_at: row.posted_at.map(|at| at.with_timezone(&Utc)),
            debit: row.debit,
            credit: row.credit,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct EntryTotalsRow {
    id: Uuid,
    entry_number: String,
    total_debit: Decimal,
    total_credit: Decimal,
    line_debit: Option<Decimal>,
    line_credit: Option<Decimal>,
}

impl From<EntryTotalsRow> for EntryTotalsCheck {
    fn from(row: EntryTotalsRow) -> Self {
        Self {
            entry_id: JournalEntryId::from_uuid(row.id),
            entry_number: row.entry_number,
            stored: EntryTotals {
                debit: row.total_debit,
                credit: row.total_credit,
            },
            lines: EntryTotals {
                debit: row.line_debit.unwrap_or_default(),
                credit: row.line_credit.unwrap_or_default(),
            },
        }
    }
}

fn to_entry(model: journal_entries::Model, lines: Vec<journal_lines::Model>) -> JournalEntry {
    JournalEntry {
        id: JournalEntryId::from_uuid(model.id),
        entry_number: model.entry_number,
        sequence: model.sequence,
        entry_date: model.entry_date,
        description: model.description,
        key: IdempotencyKey::new(model.source_type, model.source_id, model.purpose),
        status: model.status.into(),
        total_debit: model.total_debit,
        total_credit: model.total_credit,
        posted_at: model.posted_at.map(|at| at.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        reverses: model.reverses.map(JournalEntryId::from_uuid),
        reversed_by: model.reversed_by.map(JournalEntryId::from_uuid),
        void_reason: model.void_reason,
        lines: lines.into_iter().map(to_line).collect(),
    }
}

fn to_line(model: journal_lines::Model) -> JournalLine {
    JournalLine {
        id: JournalLineId::from_uuid(model.id),
        entry_id: JournalEntryId::from_uuid(model.entry_id),
        account_id: AccountId::from_uuid(model.account_id),
        // Written from a u32, so never negative.
        line_number: u32::try_from(model.line_number).unwrap_or_default(),
        debit: model.debit,
        credit: model.credit,
        description: model.description,
    }
}

/// Journal stored in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a new ledger store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn lines<C: ConnectionTrait>(conn: &C, entry_id: Uuid) -> Result<Vec<journal_lines::Model>, DbErr> {
        journal_lines::Entity::find()
            .filter(journal_lines::Column::EntryId.eq(entry_id))
            .order_by_asc(journal_lines::Column::LineNumber)
            .all(conn)
            .await
    }

    async fn load<C: ConnectionTrait>(
        conn: &C,
        model: journal_entries::Model,
    ) -> Result<JournalEntry, DbErr> {
        let lines = Self::lines(conn, model.id).await?;
        Ok(to_entry(model, lines))
    }

    async fn insert_entry(
        txn: &DatabaseTransaction,
        entry: NewJournalEntry,
    ) -> Result<JournalEntry, DbErr> {
        let now = Utc::now();
        let totals = entry.totals().map_err(|err| DbErr::Custom(err.to_string()))?;
        let lines = entry
            .lines
            .iter()
            .map(|line| {
                let line_number = i32::try_from(line.line_number)
                    .map_err(|_| DbErr::Custom(format!("line number {} out of range", line.line_number)))?;
                Ok(journal_lines::ActiveModel {
                    id: Set(line.id.into_inner()),
                    entry_id: Set(entry.id.into_inner()),
                    account_id: Set(line.account_id.into_inner()),
                    line_number: Set(line_number),
                    debit: Set(line.debit),
                    credit: Set(line.credit),
                    description: Set(line.description.clone()),
                    created_at: Set(now.into()),
                })
            })
            .collect::<Result<Vec<_>, DbErr>>()?;

        journal_entries::ActiveModel {
            id: Set(entry.id.into_inner()),
            entry_number: Set(entry.entry_number.clone()),
            sequence: Set(entry.sequence),
            entry_date: Set(entry.entry_date),
            description: Set(entry.description.clone()),
            source_type: Set(entry.key.source_type().to_string()),
            source_id: Set(entry.key.source_id().to_string()),
            purpose: Set(entry.key.purpose().to_string()),
            status: Set(entry.status.into()),
            total_debit: Set(totals.debit),
            total_credit: Set(totals.credit),
            posted_at: Set(entry.posted_at.map(Into::into)),
            created_at: Set(now.into()),
            reverses: Set(entry.reverses.map(JournalEntryId::into_inner)),
            reversed_by: Set(None),
            void_reason: Set(None),
        }
        .insert(txn)
        .await?;
        journal_lines::Entity::insert_many(lines).exec(txn).await?;

        entry.into_entry(now).map_err(|err| DbErr::Custom(err.to_string()))
    }

    async fn lock_entry(
        txn: &DatabaseTransaction,
        id: JournalEntryId,
    ) -> Result<journal_entries::Model, LedgerError> {
        journal_entries::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(storage_err)?
            .ok_or(LedgerError::EntryNotFound(id))
    }
}

/// Maps a failed write, naming the key when the idempotency index fired.
fn write_err(err: DbErr, key: &IdempotencyKey) -> LedgerError {
    if violates(&err, IDEMPOTENCY_INDEX) {
        LedgerError::DuplicatePosting { key: key.clone() }
    } else {
        storage_err(err)
    }
}

impl LedgerStore for PgLedgerStore {
    async fn next_sequence(&self) -> Result<i64, LedgerError> {
        let row = SequenceRow::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            "SELECT nextval('journal_entry_number_seq') AS value",
        ))
        .one(&self.db)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| LedgerError::Storage("sequence returned no row".into()))?;
        Ok(row.value)
    }

    async fn append(&self, entry: NewJournalEntry) -> Result<JournalEntry, LedgerError> {
        if entry.status == LedgerStatus::Void {
            return Err(LedgerError::Internal("cannot append a VOID entry".into()));
        }
        ensure_balanced(entry.totals()?)?;
        let key = entry.key.clone();

        let txn = self.db.begin().await.map_err(storage_err)?;
        let stored = Self::insert_entry(&txn, entry)
            .await
            .map_err(|err| write_err(err, &key))?;
        txn.commit().await.map_err(|err| write_err(err, &key))?;
        Ok(stored)
    }

    async fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<JournalEntry>, LedgerError> {
        let model = journal_entries::Entity::find()
            .filter(journal_entries::Column::SourceType.eq(key.source_type()))
            .filter(journal_entries::Column::SourceId.eq(key.source_id()))
            .filter(journal_entries::Column::Purpose.eq(key.purpose()))
            .filter(journal_entries::Column::Status.eq(EntryStatus::Posted))
            .one(&self.db)
            .await
            .map_err(storage_err)?;
        match model {
            Some(model) => Ok(Some(Self::load(&self.db, model).await.map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    async fn find_entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        let model = journal_entries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage_err)?;
        match model {
            Some(model) => Ok(Some(Self::load(&self.db, model).await.map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    async fn mark_posted(&self, id: JournalEntryId, posted_at: DateTime<Utc>) -> Result<JournalEntry, LedgerError> {
        let txn = self.db.begin().await.map_err(storage_err)?;
        let model = Self::lock_entry(&txn, id).await?;
        match model.status {
            EntryStatus::Draft => {}
            EntryStatus::Posted => return Err(LedgerError::CannotModifyPosted),
            EntryStatus::Void => return Err(LedgerError::CannotModifyVoided),
        }
        let key = IdempotencyKey::new(&model.source_type, &model.source_id, &model.purpose);
        let lines = Self::lines(&txn, model.id).await.map_err(storage_err)?;
        let totals = lines
            .iter()
            .try_fold(EntryTotals::default(), |totals, line| totals.checked_add(line.debit, line.credit))?;
        ensure_balanced(totals)?;

        let mut active: journal_entries::ActiveModel = model.into();
        active.status = Set(EntryStatus::Posted);
        active.posted_at = Set(Some(posted_at.into()));
        let updated = active.update(&txn).await.map_err(|err| write_err(err, &key))?;
        txn.commit().await.map_err(|err| write_err(err, &key))?;
        Ok(to_entry(updated, lines))
    }

    async fn void(&self, id: JournalEntryId, reason: String, reversal: NewJournalEntry) -> Result<VoidedEntry, LedgerError> {
        ensure_balanced(reversal.totals()?)?;
        let reversal_key = reversal.key.clone();
        let reversal_id = reversal.id;

        let txn = self.db.begin().await.map_err(storage_err)?;
        let model = Self::lock_entry(&txn, id).await?;
        match model.status {
            EntryStatus::Posted => {}
            EntryStatus::Draft => return Err(LedgerError::CannotVoidDraft),
            EntryStatus::Void => return Err(LedgerError::CannotModifyVoided),
        }
        let lines = Self::lines(&txn, model.id).await.map_err(storage_err)?;

        let reversal = Self::insert_entry(&txn, reversal)
            .await
            .map_err(|err| write_err(err, &reversal_key))?;

        let mut active: journal_entries::ActiveModel = model.into();
        active.status = Set(EntryStatus::Void);
        active.reversed_by = Set(Some(reversal_id.into_inner()));
        active.void_reason = Set(Some(reason));
        let original = active.update(&txn).await.map_err(storage_err)?;
        txn.commit()
            .await
            .map_err(|err| write_err(err, &reversal_key))?;

        Ok(VoidedEntry {
            original: to_entry(original, lines),
            reversal,
        })
    }

    fn lines_for_account(&self, account_id: AccountId, counted_only: bool) -> BoxStream<'_, Result<AccountLine, LedgerError>> {
        let mut query = journal_lines::Entity::find()
            .select_only()
            .column(journal_lines::Column::EntryId)
            .column_as(journal_lines::Column::Id, "line_id")
            .column(journal_lines::Column::Debit)
            .column(journal_lines::Column::Credit)
            .column(journal_entries::Column::PostedAt)
            .join(JoinType::InnerJoin, journal_lines::Relation::JournalEntries.def())
            .filter(journal_lines::Column::AccountId.eq(account_id.into_inner()));
        if counted_only {
            query = query.filter(journal_entries::Column::Status.is_in(EntryStatus::COUNTED));
        }
        let query = query
            .order_by_with_nulls(journal_entries::Column::PostedAt, Order::Asc, NullOrdering::Last)
            .order_by_asc(journal_lines::Column::EntryId)
            .order_by_asc(journal_lines::Column::LineNumber)
            .into_model::<AccountLineRow>();

        stream::once(async move {
            let rows = query.stream(&self.db).await.map_err(storage_err)?;
            Ok::<_, LedgerError>(rows.map_ok(AccountLine::from).map_err(storage_err))
        })
        .try_flatten()
        .boxed()
    }

    fn entry_totals(&self) -> BoxStream<'_, Result<EntryTotalsCheck, LedgerError>> {
        let query = journal_entries::Entity::find()
            .select_only()
            .column(journal_entries::Column::Id)
            .column(journal_entries::Column::EntryNumber)
            .column(journal_entries::Column::TotalDebit)
            .column(journal_entries::Column::TotalCredit)
            .column_as(
                Expr::col((journal_lines::Entity, journal_lines::Column::Debit)).sum(),
                "line_debit",
            )
            .column_as(
                Expr::col((journal_lines::Entity, journal_lines::Column::Credit)).sum(),
                "line_credit",
            )
            .join(JoinType::LeftJoin, journal_entries::Relation::JournalLines.def())
            .filter(journal_entries::Column::Status.is_in(EntryStatus::COUNTED))
            .group_by(journal_entries::Column::Id)
            .order_by_asc(journal_entries::Column::Sequence)
            .into_model::<EntryTotalsRow>();

        stream::once(async move {
            let rows = query.stream(&self.db).await.map_err(storage_err)?;
            Ok::<_, LedgerError>(rows.map_ok(EntryTotalsCheck::from).map_err(storage_err))
        })
        .try_flatten()
        .boxed()
    }
}
