//! The gateway's volatile in-memory register bank (spec's Non-goal list
//! explicitly excludes persistence beyond this). Shared between the
//! Modbus TCP/RTU service and both ingest loops.

use std::sync::Mutex;

pub struct Registers {
    words: Mutex<Vec<u16>>,
}

impl Registers {
    pub fn new(count: usize) -> Self {
        Registers {
            words: Mutex::new(vec![0u16; count]),
        }
    }

    pub fn read(&self, addr: u16, count: u16) -> Option<Vec<u16>> {
        let words = self.words.lock().unwrap();
        let start = addr as usize;
        let end = start.checked_add(count as usize)?;
        words.get(start..end).map(|s| s.to_vec())
    }

    pub fn write_single(&self, addr: u16, value: u16) -> bool {
        let mut words = self.words.lock().unwrap();
        match words.get_mut(addr as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
