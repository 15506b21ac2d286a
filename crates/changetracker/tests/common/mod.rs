#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use changetracker::{List, Object, Properties, ReflectResolver, Tracker, TypeRegistry, Value};

pub struct Address {
    pub city: String,
    pub zip: String,
}

pub struct Person {
    pub name: String,
    pub age: i64,
    pub tags: List,
    pub address: Option<Rc<RefCell<Address>>>,
    pub ssn: String,
}

pub struct Counter {
    pub value: i64,
    pub name: String,
    pub hits: i64,
}

pub struct Inner {
    pub value: i64,
}

pub struct Outer {
    pub inner: Rc<RefCell<Inner>>,
}

pub fn types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types
        .register::<Person>("Person")
        .field_mut("Name", |p| p.name.clone(), |p, v: String| p.name = v)
        .field_mut("Age", |p| p.age, |p, v: i64| p.age = v)
        .field("Tags", |p| p.tags.clone())
        .field_mut(
            "Address",
            |p| p.address.clone(),
            |p, v: Option<Rc<RefCell<Address>>>| p.address = v,
        )
        .hidden_field("ssn")
        .getter("GetName", |p| p.name.clone())
        .getter("GetAddress", |p| p.address.clone())
        .setter("SetName", |p, v: String| p.name = v)
        .setter("SetAge", |p, v: i64| p.age = v);
    types
        .register::<Address>("Address")
        .field_mut("City", |a| a.city.clone(), |a, v: String| a.city = v)
        .field_mut("Zip", |a| a.zip.clone(), |a, v: String| a.zip = v);
    types
        .register::<Counter>("Counter")
        .field("Hits", |c| c.hits)
        .getter("Value", |c| c.value)
        .getter("Name", |c| c.name.clone())
        .setter("SetValue", |c, v: i64| c.value = v)
        .setter("SetName", |c, v: String| c.name = v)
        .setter_returning("NeedsArg", |c, x: i64| c.value + x)
        .action("VoidMethod", |c| c.hits += 1);
    types
        .register::<Outer>("Outer")
        .getter("Inner", |o| Rc::clone(&o.inner))
        .setter("SetInner", |o, v: Rc<RefCell<Inner>>| o.inner = v);
    types
        .register::<Inner>("Inner")
        .getter("Value", |i| i.value)
        .setter("SetValue", |i, v: i64| i.value = v);
    types
}

pub fn tracker() -> Tracker {
    Tracker::with_resolver(ReflectResolver::new(types()))
}

pub fn person(name: &str, age: i64) -> (Rc<RefCell<Person>>, Value) {
    let cell = Rc::new(RefCell::new(Person {
        name: name.to_string(),
        age,
        tags: List::from_vec(vec![Value::from("admin"), Value::from("dev")]),
        address: Some(Rc::new(RefCell::new(Address {
            city: "Paris".to_string(),
            zip: "75001".to_string(),
        }))),
        ssn: "000-00-0000".to_string(),
    }));
    let value = Value::Object(Object::from_rc(Rc::clone(&cell)));
    (cell, value)
}

pub fn counter(value: i64) -> (Rc<RefCell<Counter>>, Value) {
    let cell = Rc::new(RefCell::new(Counter {
        value,
        name: "counter".to_string(),
        hits: 0,
    }));
    let value = Value::from(Rc::clone(&cell));
    (cell, value)
}

pub fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
