//! The heap of the machine. It's an append-only arena of pair cells: addresses are handed out in
//! increasing order starting at zero, and a cell is never freed, moved or reused.

use crate::value::{Address, Value, CELL_SIZE};

/// The largest number of cells whose addresses still fit in a 32 bit payload.
pub const MAX_CELLS: usize = (u32::MAX as usize / CELL_SIZE as usize) + 1;

/// A pair cell: two value-width slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    pub car: Value,
    pub cdr: Value,
}

#[derive(Debug, Default)]
pub struct Heap {
    cells: Vec<Cell>,
}

impl Heap {
    /// Reserves the next cell and returns its address. Running out of address space is fatal:
    /// handing out a wrapped address would break every value that points into the heap.
    pub fn alloc_cell(&mut self) -> Address {
        if self.cells.len() >= MAX_CELLS {
            log::error!("heap exhausted after {} cells", self.cells.len());
            std::process::abort();
        }

        let address = self.high_water_mark();
        self.cells.push(Cell::default());
        address
    }

    /// Allocates a cell and fills both of its slots.
    pub(crate) fn alloc_pair(&mut self, car: Value, cdr: Value) -> Address {
        let address = self.alloc_cell();
        self.cells[address.index()] = Cell { car, cdr };
        address
    }

    /// The address the next allocation will return.
    pub fn high_water_mark(&self) -> Address {
        Address((self.cells.len() as u32).wrapping_mul(CELL_SIZE))
    }

    /// Reads a cell.
    ///
    /// # Panics
    ///
    /// Panics if the address was never handed out by this heap.
    pub fn cell(&self, address: Address) -> &Cell {
        match self.cells.get(address.index()) {
            Some(cell) => cell,
            None => panic!(
                "dangling address {:?}, heap ends at {:?}",
                address,
                self.high_water_mark()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_grow_by_one_cell() {
        let mut heap = Heap::default();
        assert_eq!(heap.alloc_cell(), Address(0));
        assert_eq!(heap.alloc_cell(), Address(16));
        assert_eq!(heap.alloc_cell(), Address(32));
        assert_eq!(heap.high_water_mark(), Address(48));
    }

    #[test]
    fn pairs_keep_their_slots() {
        let mut heap = Heap::default();
        heap.alloc_cell();
        let address = heap.alloc_pair(Value::make_number(1), Value::make_number(2));
        assert_eq!(address, Address(16));
        assert_eq!(
            *heap.cell(address),
            Cell {
                car: Value::make_number(1),
                cdr: Value::make_number(2),
            }
        );
    }

    #[test]
    #[should_panic(expected = "dangling address")]
    fn reading_past_the_high_water_mark_panics() {
        let heap = Heap::default();
        heap.cell(Address(0));
    }
}
