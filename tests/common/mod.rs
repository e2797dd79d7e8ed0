#![allow(dead_code)]

use std::collections::HashMap;

/// Builds a `find_sym` closure over a name → address map.
pub fn lookup(
    map: HashMap<&'static str, usize>,
) -> impl Fn(&str) -> Option<*const ()> + Send + Sync + 'static {
    move |name: &str| map.get(name).copied().map(|addr| addr as *const ())
}

/// A lookup that resolves nothing.
pub fn empty_lookup() -> impl Fn(&str) -> Option<*const ()> {
    |_: &str| None
}

pub unsafe fn read_u32(addr: usize) -> u32 {
    unsafe { (addr as *const u32).read_unaligned() }
}

/// The patched word at `offset` of a relocated section.
pub fn section_word(object: &objlink::Object, section: &str, offset: usize) -> u32 {
    let bytes = object.section_bytes(section).unwrap();
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

pub fn sign_extend_24(x: u32) -> i32 {
    ((x << 8) as i32) >> 8
}

pub fn round_up(x: usize, align: usize) -> usize {
    (x + align - 1) & !(align - 1)
}
