#![no_std]
#![cfg_attr(test, no_main)]
#![feature(custom_test_frameworks)]
#![feature(alloc_error_handler)]
#![test_runner(crate::test_runner)]
#![reexport_test_harness_main = "test_main"]

//! The core of a self-contained 32-bit x86 kernel: process and
//! scheduling, physical memory, the FAT16/VFS storage stack, and the
//! dual-format program loader. The PIT/IDT glue, serial debug port
//! wiring, and every interactive driver above these layers are external
//! collaborators this crate only calls out to through narrow interfaces
//! (see SPEC_FULL.md).

extern crate alloc;

pub mod block;
pub mod config;
pub mod error;
pub mod fs;
pub mod kernel;
pub mod loader;
pub mod logger;
pub mod memory;
pub mod process;
#[cfg(target_arch = "x86_64")]
pub mod serial;
pub mod syscall;
pub mod task;

#[cfg(test)]
fn test_kernel_main() -> ! {
    memory::init();
    serial::init();
    serial::install_logger();
    test_main();
    hlt_loop();
}

#[cfg(test)]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    test_kernel_main()
}

pub fn test_runner(tests: &[&dyn Testable]) {
    log::info!("running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    #[cfg(target_arch = "x86_64")]
    exit_qemu(QemuExitCode::Success);
}

pub trait Testable {
    fn run(&self);
}

impl<T: Fn()> Testable for T {
    fn run(&self) {
        log::info!("{}...", core::any::type_name::<T>());
        self();
        log::info!("  [ok]");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

/// Writes the given code to the isa-debug-exit port QEMU is configured
/// with, ending the test run. A no-op outside QEMU.
#[cfg(target_arch = "x86_64")]
pub fn exit_qemu(exit_code: QemuExitCode) {
    use x86_64::instructions::port::Port;
    // SAFETY: 0xf4 is the isa-debug-exit port this crate's QEMU
    // invocation is configured with; writing to it only ever ends the
    // current run.
    unsafe {
        let mut port = Port::new(0xf4);
        port.write(exit_code as u32);
    }
}

#[cfg(target_arch = "x86_64")]
pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn hlt_loop() -> ! {
    loop {}
}

/// Halts until the next interrupt, once. Used by the idle dispatch loop
/// between voluntary-checkpoint calls, rather than spinning hot.
#[cfg(target_arch = "x86_64")]
pub fn hlt_loop_once() {
    x86_64::instructions::hlt();
}

#[cfg(not(target_arch = "x86_64"))]
pub fn hlt_loop_once() {}

#[cfg(test)]
pub fn test_panic_handler(info: &core::panic::PanicInfo) -> ! {
    log::error!("[failed]");
    log::error!("{info}");
    #[cfg(target_arch = "x86_64")]
    exit_qemu(QemuExitCode::Failed);
    hlt_loop();
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_panic_handler(info)
}
