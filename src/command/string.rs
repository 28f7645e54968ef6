use crate::command::{wrong_arg_count, wrong_type};
use crate::protocol::Reply;
use crate::store::entry::Entry;
use crate::store::Store;
use crate::types::Value;

pub fn cmd_get(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 1 {
        return wrong_arg_count("get");
    }
    match store.get(&args[0]) {
        None => Reply::Nil,
        Some(entry) => match &entry.value {
            Value::String(data) => Reply::String(data.clone()),
            Value::SortedSet(_) => wrong_type(),
        },
    }
}

pub fn cmd_set(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 2 {
        return wrong_arg_count("set");
    }
    if store.get(&args[0]).is_none() {
        store.insert(args[0].clone(), Entry::new(Value::String(args[1].clone())));
        return Reply::Nil;
    }
    match store.get_mut(&args[0]) {
        Some(entry) => match &mut entry.value {
            Value::String(data) => {
                *data = args[1].clone();
                Reply::Nil
            }
            Value::SortedSet(_) => wrong_type(),
        },
        None => unreachable!("checked above"),
    }
}
