#![no_std]
#![no_main]

//! Freestanding entry point. Boot handoff (multiboot/bootloader protocol,
//! GDT/IDT setup, PIT programming) is external-collaborator territory
//! this crate does not implement — see SPEC_FULL.md and spec.md's
//! explicit Non-goals. This binary assumes it is entered with a flat,
//! already-identity-mapped 32-bit address space and interrupts disabled.

extern crate alloc;

use kernel::block::{BlockDevice, RamDisk};
use kernel::config::SECTOR_SIZE;
use kernel::fs::fat16::Fat16;
use kernel::fs::vfs::Fat16Fs;
use kernel::kernel::Kernel;

#[no_mangle]
pub extern "C" fn _start() -> ! {
    kernel::memory::init();
    kernel::serial::init();
    kernel::serial::install_logger();

    log::info!("booting");

    let mut k = Kernel::new();
    mount_root(&mut k);

    let init_pid = k.process.register_current("init").expect("process table has room for pid 2 at boot");
    log::info!("pid {init_pid} (init) registered, entering dispatch loop");
    loop {
        k.process.yield_point();
        kernel::hlt_loop_once();
    }
}

/// Formats a fresh in-memory FAT16 root volume and mounts it at `/`. A
/// real boot would instead hand a [`kernel::block::BlockDevice`]
/// implementation over the actual disk controller (out of scope here);
/// [`RamDisk`] plays that role until one exists.
fn mount_root(k: &mut Kernel) {
    let sectors = 16 * 1024 * 1024 / SECTOR_SIZE as u32;
    let mut disk = RamDisk::new(sectors);
    let mut sector0 = [0u8; SECTOR_SIZE];
    sector0[446 + 4] = 0x06;
    sector0[0x0B..0x0D].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    sector0[0x0D] = 1;
    sector0[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes());
    sector0[0x10] = 2;
    sector0[0x11..0x13].copy_from_slice(&512u16.to_le_bytes());
    sector0[0x13..0x15].copy_from_slice(&(sectors as u16).to_le_bytes());
    sector0[0x16..0x18].copy_from_slice(&32u16.to_le_bytes());
    sector0[510] = 0x55;
    sector0[511] = 0xAA;
    if disk.write(0, 1, &sector0).is_err() {
        log::error!("failed to format ram disk");
        return;
    }

    match Fat16::mount(disk) {
        Ok(fs) => k.vfs.mount("/", alloc::boxed::Box::new(Fat16Fs::new(fs))),
        Err(e) => log::error!("failed to mount root filesystem: {e}"),
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    kernel::serial::emergency_print("panic: ");
    let msg = alloc::format!("{info}\n");
    kernel::serial::emergency_print(&msg);
    kernel::hlt_loop();
}
