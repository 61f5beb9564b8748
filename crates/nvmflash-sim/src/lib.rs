//! nvmflash-sim - In-memory NVM controller emulator
//!
//! This crate provides [`SimController`], an implementation of
//! [`NvmController`] that emulates a SAM D2x style NVM controller in memory:
//! a flash array that is erased by row and programmed through a page buffer,
//! a ready flag that drops for a configurable number of polls after each
//! command, sticky error flags and lock regions.
//!
//! It is used by the engine tests and by the `nvmflash` CLI, which keeps the
//! emulated array in an image file.

mod error;
pub mod session;

pub use error::{Result, SimError};
pub use session::open_session;

use std::fs;
use std::path::Path;

use nvmflash_core::controller::{Command, ControllerConfig, NvmController, StatusFlags};
use nvmflash_core::geometry::{FlashGeometry, ERASED_BYTE, ERASED_WORD};

/// Configuration for the emulated controller
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Flash geometry
    pub geometry: FlashGeometry,
    /// Number of lock regions the array is divided into
    pub lock_regions: u32,
    /// Polls that report busy after each command
    pub busy_polls: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            geometry: FlashGeometry::SAMD21G18A,
            lock_regions: 16,
            busy_polls: 2,
        }
    }
}

/// A command as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    /// The command
    pub command: Command,
    /// ADDR register at the time of the command
    pub address: u32,
}

/// A page committed from the page buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWrite {
    /// First byte of the page
    pub address: u32,
    /// Words loaded into the page buffer since it was last cleared
    pub words_loaded: u32,
    /// Whether the commit was triggered by loading the last word
    pub automatic: bool,
}

/// Emulated NVM controller
pub struct SimController {
    config: SimConfig,
    data: Vec<u8>,
    page_buffer: Vec<u32>,
    /// Page the page buffer was last loaded for
    buffer_page: u32,
    words_loaded: u32,
    address: u32,
    status: StatusFlags,
    pending_fault: StatusFlags,
    locked: u32,
    busy_remaining: u32,
    stuck_busy: bool,
    stall_next: bool,
    clock_enabled: bool,
    ctrlb: u32,
    manual_write: bool,
    elapsed_us: u64,
    commands: Vec<CommandRecord>,
    page_writes: Vec<PageWrite>,
    status_clears: u32,
}

impl SimController {
    /// Create an erased flash with the given configuration
    pub fn new(config: SimConfig) -> Result<Self> {
        config.geometry.validate()?;
        let flash_size = config.geometry.flash_size;
        if config.lock_regions == 0
            || config.lock_regions > 32
            || flash_size % config.lock_regions != 0
        {
            return Err(SimError::InvalidLockRegions(config.lock_regions));
        }

        Ok(Self::build(config))
    }

    /// Create an emulator with the default configuration (ATSAMD21G18A)
    pub fn new_default() -> Self {
        Self::build(SimConfig::default())
    }

    fn build(config: SimConfig) -> Self {
        let flash_size = config.geometry.flash_size;
        // CTRLB reset value: MANW set, everything else zero
        let reset = ControllerConfig::from_ctrlb(0x0000_0080);

        Self {
            data: vec![ERASED_BYTE; flash_size as usize],
            page_buffer: vec![ERASED_WORD; config.geometry.words_per_page() as usize],
            buffer_page: 0,
            words_loaded: 0,
            address: 0,
            status: StatusFlags::empty(),
            pending_fault: StatusFlags::empty(),
            locked: 0,
            busy_remaining: 0,
            stuck_busy: false,
            stall_next: false,
            clock_enabled: false,
            ctrlb: reset.ctrlb(),
            manual_write: reset.manual_write,
            elapsed_us: 0,
            commands: Vec::new(),
            page_writes: Vec::new(),
            status_clears: 0,
            config,
        }
    }

    /// Create an emulator whose array starts with `initial_data`
    ///
    /// Bytes past the end of `initial_data` are erased.
    pub fn with_data(config: SimConfig, initial_data: &[u8]) -> Result<Self> {
        let mut sim = Self::new(config)?;
        if initial_data.len() > sim.data.len() {
            return Err(SimError::ImageTooLarge {
                actual: initial_data.len(),
                capacity: sim.data.len(),
            });
        }
        sim.data[..initial_data.len()].copy_from_slice(initial_data);
        Ok(sim)
    }

    /// Load the array from an image file, or start erased if it does not exist
    pub fn from_image_file(config: SimConfig, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Image {} not found, starting with erased flash", path.display());
            return Self::new(config);
        }
        let image = fs::read(path)?;
        log::debug!("Loaded {} bytes from {}", image.len(), path.display());
        Self::with_data(config, &image)
    }

    /// Write the whole array to an image file
    pub fn save_image(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }

    /// The flash array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the flash array, bypassing the controller
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Set error flags as if a previous operation had left them behind
    pub fn set_status(&mut self, flags: StatusFlags) {
        self.status |= flags;
    }

    /// Raise `flags` on the next command, in addition to its own outcome
    pub fn inject_fault(&mut self, flags: StatusFlags) {
        self.pending_fault |= flags;
    }

    /// Keep the ready flag low forever (or release it)
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Hang after the next command: the ready flag never comes back
    pub fn stall_on_next_command(&mut self) {
        self.stall_next = true;
    }

    /// Report busy for the next `polls` polls
    pub fn hold_busy(&mut self, polls: u32) {
        self.busy_remaining = polls;
    }

    /// Current sticky status flags
    pub fn status(&self) -> StatusFlags {
        self.status
    }

    /// Whether the region containing `addr` is locked
    pub fn is_locked(&self, addr: u32) -> bool {
        self.region_of(addr)
            .map(|region| self.locked & (1 << region) != 0)
            .unwrap_or(false)
    }

    /// Bit mask of locked regions (bit n is region n)
    pub fn locked_regions(&self) -> u32 {
        self.locked
    }

    /// Restore the lock bits, as the fuses would after a reset
    pub fn set_locked_regions(&mut self, mask: u32) {
        let valid = if self.config.lock_regions >= 32 {
            u32::MAX
        } else {
            (1 << self.config.lock_regions) - 1
        };
        self.locked = mask & valid;
    }

    /// Whether the bus clock was enabled
    pub fn clock_enabled(&self) -> bool {
        self.clock_enabled
    }

    /// Last value written to CTRLB
    pub fn ctrlb(&self) -> u32 {
        self.ctrlb
    }

    /// Commands executed so far
    pub fn command_log(&self) -> &[CommandRecord] {
        &self.commands
    }

    /// Pages committed so far
    pub fn page_writes(&self) -> &[PageWrite] {
        &self.page_writes
    }

    /// Number of status acknowledgments
    pub fn status_clears(&self) -> u32 {
        self.status_clears
    }

    /// Total time spent in `delay_us`
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Forget the command and page write history
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.page_writes.clear();
        self.status_clears = 0;
    }

    /// Array offset of an absolute address, if it is inside the array
    fn offset_of(&self, addr: u32) -> Option<usize> {
        let geometry = &self.config.geometry;
        let offset = addr.checked_sub(geometry.base_address)?;
        (offset < geometry.flash_size).then_some(offset as usize)
    }

    fn region_of(&self, addr: u32) -> Option<u32> {
        let region_size = self.config.geometry.flash_size / self.config.lock_regions;
        self.offset_of(addr).map(|offset| offset as u32 / region_size)
    }

    fn erase_row(&mut self) {
        let geometry = self.config.geometry;
        let Some(offset) = self.offset_of(self.address) else {
            self.status |= StatusFlags::PROGE;
            return;
        };
        if self.is_locked(self.address) {
            self.status |= StatusFlags::LOCKE;
            return;
        }
        let row_size = geometry.row_size() as usize;
        let row_start = offset - offset % row_size;
        self.data[row_start..row_start + row_size].fill(ERASED_BYTE);
        log::trace!("sim: erased row at offset 0x{:X}", row_start);
    }

    /// Program the page buffer into `page` (index from the array start)
    fn commit_page(&mut self, page: u32, automatic: bool) {
        let geometry = self.config.geometry;
        let page_offset = page * geometry.page_size;
        let address = geometry.base_address + page_offset;

        if page_offset >= geometry.flash_size {
            self.status |= StatusFlags::PROGE;
            return;
        }
        if self.is_locked(address) {
            self.status |= StatusFlags::LOCKE;
            return;
        }

        let word_size = geometry.word_size as usize;
        for (i, word) in self.page_buffer.iter().enumerate() {
            let start = page_offset as usize + i * word_size;
            let bytes = word.to_le_bytes();
            for (b, byte) in self.data[start..start + word_size].iter_mut().enumerate() {
                // Programming can only clear bits
                *byte &= bytes[b];
            }
        }

        self.page_writes.push(PageWrite {
            address,
            words_loaded: self.words_loaded,
            automatic,
        });
        log::trace!(
            "sim: wrote page 0x{:08X} ({} words loaded)",
            address,
            self.words_loaded
        );

        self.page_buffer.fill(ERASED_WORD);
        self.words_loaded = 0;
        self.status.remove(StatusFlags::LOAD);
    }

    fn set_lock(&mut self, lock: bool) {
        let Some(region) = self.region_of(self.address) else {
            self.status |= StatusFlags::PROGE;
            return;
        };
        if lock {
            self.locked |= 1 << region;
        } else {
            self.locked &= !(1 << region);
        }
    }
}

impl NvmController for SimController {
    fn enable_clock(&mut self) {
        self.clock_enabled = true;
    }

    fn configure(&mut self, config: &ControllerConfig) {
        self.ctrlb = config.ctrlb();
        self.manual_write = config.manual_write;
    }

    fn is_ready(&mut self) -> bool {
        if self.stuck_busy {
            return false;
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return false;
        }
        true
    }

    fn issue_command(&mut self, cmd: Command) {
        self.commands.push(CommandRecord {
            command: cmd,
            address: self.address,
        });

        if !self.clock_enabled {
            self.status |= StatusFlags::NVME;
            return;
        }
        if self.busy_remaining > 0 || self.stuck_busy {
            // Command written while another one is running
            self.status |= StatusFlags::PROGE;
            return;
        }

        match cmd {
            Command::EraseRow => self.erase_row(),
            Command::WritePage => match self.offset_of(self.address) {
                Some(offset) => {
                    let page = offset as u32 / self.config.geometry.page_size;
                    self.commit_page(page, false);
                }
                None => self.status |= StatusFlags::PROGE,
            },
            Command::LockRegion => self.set_lock(true),
            Command::UnlockRegion => self.set_lock(false),
            Command::PageBufferClear => {
                self.page_buffer.fill(ERASED_WORD);
                self.words_loaded = 0;
                self.status.remove(StatusFlags::LOAD);
            }
        }

        self.status |= self.pending_fault;
        self.pending_fault = StatusFlags::empty();
        self.busy_remaining = self.config.busy_polls;
        if self.stall_next {
            self.stall_next = false;
            self.stuck_busy = true;
        }
    }

    fn set_address(&mut self, addr: u32) {
        self.address = addr;
    }

    fn read_status(&mut self) -> StatusFlags {
        self.status
    }

    fn clear_status(&mut self, mask: StatusFlags) {
        self.status.remove(mask);
        self.status_clears += 1;
    }

    fn read_word(&mut self, word_index: u32) -> u32 {
        let word_size = self.config.geometry.word_size as usize;
        let start = word_index as usize * word_size;
        let mut bytes = [ERASED_BYTE; 4];
        if let Some(src) = self.data.get(start..start + word_size) {
            bytes[..word_size].copy_from_slice(src);
        }
        u32::from_le_bytes(bytes)
    }

    fn write_word(&mut self, word_index: u32, value: u32) {
        let words_per_page = self.config.geometry.words_per_page();
        let position = word_index % words_per_page;
        self.page_buffer[position as usize] = value;
        self.buffer_page = word_index / words_per_page;
        self.words_loaded += 1;
        self.status |= StatusFlags::LOAD;

        if !self.manual_write && position + 1 == words_per_page {
            self.commit_page(self.buffer_page, true);
            self.busy_remaining = self.config.busy_polls;
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SimConfig {
        SimConfig {
            geometry: FlashGeometry {
                page_size: 16,
                pages_per_row: 4,
                word_size: 4,
                flash_size: 1024,
                base_address: 0,
                min_program_size: 4,
            },
            lock_regions: 16,
            busy_polls: 0,
        }
    }

    fn ready_sim() -> SimController {
        let mut sim = SimController::new(small()).unwrap();
        sim.enable_clock();
        sim
    }

    #[test]
    fn test_starts_erased() {
        let sim = SimController::new_default();
        assert_eq!(sim.data().len(), 256 * 1024);
        assert!(sim.data().iter().all(|&b| b == 0xFF));
        assert!(!sim.clock_enabled());
        assert_eq!(sim.ctrlb(), 0x80);
    }

    #[test]
    fn test_programming_only_clears_bits() {
        let mut sim = ready_sim();
        sim.issue_command(Command::PageBufferClear);
        sim.write_word(4, 0x0F0F_0F0F);
        sim.set_address(16);
        sim.issue_command(Command::WritePage);

        sim.issue_command(Command::PageBufferClear);
        sim.write_word(4, 0xFF00_FF00);
        sim.issue_command(Command::WritePage);

        assert_eq!(sim.read_word(4), 0x0F00_0F00);
        assert_eq!(sim.read_word(5), ERASED_WORD);
        assert!(sim.status().is_empty());
    }

    #[test]
    fn test_automatic_write_on_last_word() {
        let mut sim = ready_sim();
        sim.configure(&ControllerConfig {
            manual_write: false,
            ..ControllerConfig::default()
        });
        sim.issue_command(Command::PageBufferClear);
        for i in 8..12 {
            sim.write_word(i, i);
        }
        assert_eq!(sim.page_writes().len(), 1);
        assert_eq!(sim.page_writes()[0].address, 32);
        assert!(sim.page_writes()[0].automatic);
        assert_eq!(sim.read_word(11), 11);
    }

    #[test]
    fn test_erase_row_ignores_offset_in_row() {
        let mut sim = ready_sim();
        sim.data_mut()[64..128].fill(0);
        sim.set_address(64 + 20);
        sim.issue_command(Command::EraseRow);
        assert!(sim.data()[64..128].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_locked_region_sets_locke() {
        let mut sim = ready_sim();
        sim.data_mut()[0..64].fill(0);
        sim.set_address(0);
        sim.issue_command(Command::LockRegion);
        assert!(sim.is_locked(0));
        assert!(!sim.is_locked(64));

        sim.issue_command(Command::EraseRow);
        assert!(sim.status().contains(StatusFlags::LOCKE));
        assert!(sim.data()[0..64].iter().all(|&b| b == 0));

        sim.issue_command(Command::UnlockRegion);
        assert!(!sim.is_locked(0));
    }

    #[test]
    fn test_busy_polls_and_late_command() {
        let mut config = small();
        config.busy_polls = 2;
        let mut sim = SimController::new(config).unwrap();
        sim.enable_clock();

        sim.issue_command(Command::PageBufferClear);
        assert!(!sim.is_ready());
        sim.issue_command(Command::PageBufferClear);
        assert!(sim.status().contains(StatusFlags::PROGE));
        assert!(!sim.is_ready());
        assert!(sim.is_ready());
    }

    #[test]
    fn test_command_without_clock() {
        let mut sim = SimController::new(small()).unwrap();
        sim.set_address(0);
        sim.issue_command(Command::EraseRow);
        assert!(sim.status().contains(StatusFlags::NVME));
    }

    #[test]
    fn test_injected_fault_is_sticky() {
        let mut sim = ready_sim();
        sim.inject_fault(StatusFlags::NVME);
        sim.issue_command(Command::PageBufferClear);
        sim.issue_command(Command::PageBufferClear);
        assert_eq!(sim.read_status(), StatusFlags::NVME);
        sim.clear_status(StatusFlags::NVME);
        assert!(sim.read_status().is_empty());
    }

    #[test]
    fn test_with_data_rejects_oversized_image() {
        let err = SimController::with_data(small(), &[0u8; 2048]).err().unwrap();
        assert!(matches!(
            err,
            SimError::ImageTooLarge {
                actual: 2048,
                capacity: 1024
            }
        ));
    }

    #[test]
    fn test_invalid_lock_regions() {
        let mut config = small();
        config.lock_regions = 0;
        assert!(matches!(
            SimController::new(config).err().unwrap(),
            SimError::InvalidLockRegions(0)
        ));
    }
}
