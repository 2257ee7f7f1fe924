//! 服务员呼叫服务
//!
//! Active calls live in the `waiter_calls` mailbox; resolved calls move
//! to `call_history`, which is capped so years of service do not grow
//! the database without bound.

use shared::keys;
use shared::records::{Call, CallCreate, CallResolve, CallStatus, Record};
use shared::relay::{RelayEvent, RelayEventKind};

use crate::relay::RelayHub;
use crate::store::MailboxStore;
use crate::utils::AppError;

/// Resolved calls kept in history
pub const MAX_CALL_HISTORY: usize = 500;

/// 呼叫服务
#[derive(Clone)]
pub struct CallService {
    store: MailboxStore,
    hub: RelayHub,
}

impl CallService {
    pub fn new(store: MailboxStore, hub: RelayHub) -> Self {
        Self { store, hub }
    }

    /// 发起呼叫
    pub fn open(&self, create: CallCreate) -> Result<Call, AppError> {
        let call = Call::new(create.table_number, create.kind, create.message);
        self.store
            .append(keys::WAITER_CALLS, Record::Call(call.clone()))?;

        self.publish(RelayEventKind::WaiterCall, &call)?;
        tracing::info!(call_id = %call.id, table = call.table_number, kind = %call.kind, "call opened");
        Ok(call)
    }

    /// 当前活动呼叫
    pub fn active(&self) -> Result<Vec<Call>, AppError> {
        let records = self.store.read(keys::WAITER_CALLS)?;
        Ok(records
            .into_iter()
            .filter_map(|stored| match stored.record {
                Record::Call(call) if call.status == CallStatus::Active => Some(call),
                _ => None,
            })
            .collect())
    }

    /// 解决呼叫
    ///
    /// Idempotent: resolving an already-resolved call returns it
    /// unchanged. Unknown ids are an error.
    pub fn resolve(&self, call_id: &str, resolve: CallResolve) -> Result<Call, AppError> {
        // Take the call out of the active mailbox inside one transaction
        // so two waiters tapping "done" together cannot both archive it.
        let (taken, _revision) = self.store.update(keys::WAITER_CALLS, |records| {
            let position = records.iter().position(|stored| match &stored.record {
                Record::Call(call) => call.id == call_id,
                _ => false,
            })?;
            let stored = records.remove(position);
            match stored.record {
                Record::Call(mut call) => {
                    call.resolve(resolve.resolved_by.clone());
                    Some(call)
                }
                _ => None,
            }
        })?;

        let call = match taken {
            Some(call) => call,
            None => {
                // Not active; maybe a repeat tap on a call already archived
                if let Some(resolved) = self.find_in_history(call_id)? {
                    return Ok(resolved);
                }
                return Err(AppError::not_found(format!("Call not found: {call_id}")));
            }
        };

        self.store
            .append(keys::CALL_HISTORY, Record::Call(call.clone()))?;
        self.store.compact(keys::CALL_HISTORY, MAX_CALL_HISTORY)?;

        self.publish(RelayEventKind::CallResolved, &call)?;
        tracing::info!(call_id = %call.id, table = call.table_number, "call resolved");
        Ok(call)
    }

    /// 呼叫历史 (最新在前)
    pub fn history(&self) -> Result<Vec<Call>, AppError> {
        let records = self.store.read(keys::CALL_HISTORY)?;
        let mut calls: Vec<Call> = records
            .into_iter()
            .filter_map(|stored| match stored.record {
                Record::Call(call) => Some(call),
                _ => None,
            })
            .collect();
        calls.reverse();
        Ok(calls)
    }

    fn find_in_history(&self, call_id: &str) -> Result<Option<Call>, AppError> {
        let records = self.store.read(keys::CALL_HISTORY)?;
        Ok(records.into_iter().find_map(|stored| match stored.record {
            Record::Call(call) if call.id == call_id => Some(call),
            _ => None,
        }))
    }

    fn publish(&self, kind: RelayEventKind, call: &Call) -> Result<(), AppError> {
        let event = RelayEvent::from_payload(kind, call)?;
        self.hub.publish(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::records::CallKind;

    fn service() -> CallService {
        CallService::new(MailboxStore::open_in_memory().unwrap(), RelayHub::new())
    }

    fn bill_call(table_number: i32) -> CallCreate {
        CallCreate {
            table_number,
            kind: CallKind::Bill,
            message: None,
        }
    }

    #[test]
    fn test_open_and_list_active() {
        let service = service();
        let call = service.open(bill_call(7)).unwrap();

        let active = service.active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, call.id);
        assert_eq!(active[0].status, CallStatus::Active);
    }

    #[test]
    fn test_resolve_moves_call_to_history() {
        let service = service();
        let call = service.open(bill_call(7)).unwrap();

        let resolved = service
            .resolve(
                &call.id,
                CallResolve {
                    resolved_by: Some("anna".to_string()),
                },
            )
            .unwrap();
        assert_eq!(resolved.status, CallStatus::Resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("anna"));

        assert!(service.active().unwrap().is_empty());
        let history = service.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, call.id);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let service = service();
        let call = service.open(bill_call(3)).unwrap();
        service.resolve(&call.id, CallResolve::default()).unwrap();

        // Second tap finds the archived call and changes nothing
        let again = service.resolve(&call.id, CallResolve::default()).unwrap();
        assert_eq!(again.id, call.id);
        assert_eq!(again.status, CallStatus::Resolved);
        assert_eq!(service.history().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_call() {
        let service = service();
        let result = service.resolve("missing", CallResolve::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_open_publishes_event() {
        let service = service();
        let mut rx = service.hub.subscribe();
        service.open(bill_call(2)).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, RelayEventKind::WaiterCall);
    }

    #[test]
    fn test_history_newest_first() {
        let service = service();
        let first = service.open(bill_call(1)).unwrap();
        let second = service.open(bill_call(2)).unwrap();
        service.resolve(&first.id, CallResolve::default()).unwrap();
        service.resolve(&second.id, CallResolve::default()).unwrap();

        let history = service.history().unwrap();
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }
}
