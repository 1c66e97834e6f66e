#![deny(missing_docs)]

use crate::linux;
use libc;
use std::{
    ffi::CStr,
    io,
    mem::{self, MaybeUninit},
    net::Ipv4Addr,
    os::unix::io::{AsRawFd, RawFd},
    time::Duration,
};

/// The link-level address a frame was received from.
pub struct Addr {
    inner: libc::sockaddr_storage,
    _len: libc::socklen_t,
}

impl Addr {
    fn link(&self) -> &libc::sockaddr_ll {
        // sockaddr_storage is large enough and suitably aligned for any sockaddr.
        unsafe { &*(&self.inner as *const libc::sockaddr_storage as *const libc::sockaddr_ll) }
    }

    /// The kernel's classification of the frame (host, broadcast, outgoing, ...).
    pub fn packet_type(&self) -> u8 {
        self.link().sll_pkttype
    }

    /// Whether this is a copy of a frame sent out of the interface, which `ETH_P_ALL` sockets
    /// see alongside inbound traffic.
    pub fn is_outgoing(&self) -> bool {
        self.packet_type() == linux::PACKET_OUTGOING
    }
}

/// Represents an unbound `AF_PACKET` socket.  At this phase of a socket's lifecycle, it can be
/// configured.
pub struct Socket {
    fd: libc::c_int,
}

/// Represents a bound `AF_PACKET` socket. At this phase of a socket's lifecycle, it can be read
/// to/written from, and the interface it is bound to can be queried for its addresses.
pub struct BoundSocket {
    fd: libc::c_int,
    send_addr: libc::sockaddr_ll,
    name: [libc::c_char; libc::IFNAMSIZ],
}

/// Copies an interface name into the fixed size, NUL terminated buffer the kernel expects.
fn interface_name(iface: &CStr) -> io::Result<[libc::c_char; libc::IFNAMSIZ]> {
    let bytes = iface.to_bytes();
    if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name must be between 1 and 15 bytes",
        ));
    }
    let mut name = [0 as libc::c_char; libc::IFNAMSIZ];
    for (dst, src) in name.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(name)
}

/// Builds an `ifreq` naming the given interface with every other field zeroed.
fn ifreq_for(name: &[libc::c_char; libc::IFNAMSIZ]) -> linux::ifreq {
    // An all-zero ifreq is a valid value of the type: it is plain old data.
    let mut ifr: linux::ifreq = unsafe { MaybeUninit::zeroed().assume_init() };
    ifr.ifr_ifrn.ifrn_name = *name;
    ifr
}

impl Socket {
    /// Creates a new unbound socket.
    pub fn new() -> io::Result<Self> {
        // This block must be marked as unsafe because it uses FFI with C code. We believe the code
        // in this block to be safe because it does not interact with any memory owned by Rust
        // code, nor does it violate the invariant of the Socket type -- namely, that it return an
        // Err if it fails to initialize.
        let fd = unsafe {
            // Resources:
            // https://beej.us/guide/bgnet/html/multi/syscalls.html#socket
            // man 7 packet
            let fd = libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                (libc::ETH_P_ALL as u16).to_be() as libc::c_int,
            );
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            fd
        };
        Ok(Self { fd })
    }

    /// Binds the socket to a network interface. This function consumes the `Socket` instance, as
    /// no more configuration options may be safely changed.
    pub fn bind(self, iface: impl AsRef<CStr>) -> io::Result<BoundSocket> {
        let name = interface_name(iface.as_ref())?;
        // This block is marked as unsafe because it uses FFI, however, we believe it to be safe
        // because 1) it handles FFI failures in accordance with the bound API's conventions, and
        // 2) the ifreq it hands to the kernel is owned by this stack frame and fully initialized.
        let send_addr = unsafe {
            // get the index of the interface
            let mut ifr = ifreq_for(&name);
            // ioctl(SIOCGIFINDEX) fills in the index field of the ifreq object
            // Resources:
            // man 7 netdevice
            let err = libc::ioctl(self.fd, linux::SIOCGIFINDEX, &mut ifr as *mut linux::ifreq);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }

            // bind the socket
            // Resources:
            // https://beej.us/guide/bgnet/html/multi/syscalls.html#bind
            // man 7 packet regarding sockaddr_ll
            let mut ll: libc::sockaddr_ll = MaybeUninit::zeroed().assume_init();
            ll.sll_family = libc::AF_PACKET as libc::c_ushort;
            ll.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
            ll.sll_ifindex = ifr.ifr_ifru.ifru_ivalue; // expanded from `ifr_ifindex` in kernel headers
            let err = libc::bind(
                self.fd,
                &ll as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            );
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            ll
        };
        let fd = self.fd;
        // This ensures that `self` does not attempt to close the file descriptor, as the file
        // descriptor is transferred to the BoundSocket we're returning.
        mem::forget(self);
        Ok(BoundSocket {
            fd,
            send_addr,
            name,
        })
    }

    /// Configures the socket's non-blocking status.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        // This block is marked as unsafe because it uses FFI, however, we assume this code to be
        // safe because we handle fcntl's failures properly. Additionally, we do not borrow any
        // Rust-owned memory.
        // Resources used to write syscall code:
        // https://beej.us/guide/bgnet/html/multi/advanced.html#blocking
        // man 2 fcntl
        unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFL);
            if flags < 0 {
                return Err(io::Error::last_os_error());
            }
            let new_flags = if nonblocking {
                flags | libc::O_NONBLOCK
            } else {
                flags & (!libc::O_NONBLOCK)
            };
            let err = libc::fcntl(self.fd, libc::F_SETFL, new_flags);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Returns true if the socket is configured not to block, false otherwise.
    pub fn is_nonblocking(&self) -> io::Result<bool> {
        // See comments on block above (in set_nonblocking).
        let flags = unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFL);
            if flags < 0 {
                return Err(io::Error::last_os_error());
            }
            flags
        };
        Ok(flags & libc::O_NONBLOCK == libc::O_NONBLOCK)
    }
}

impl BoundSocket {
    /// Sends a frame to the NIC.
    pub fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        // This block is marked as unsafe because it uses FFI. We believe this code to be safe,
        // because it safely borrows the Rust-owned frame and passes the length of the frame to the
        // libc function, so it should not exhibit any C-side undefined behaviour.
        unsafe {
            // Resources:
            // https://beej.us/guide/bgnet/html/multi/syscalls.html#sendtorecv
            let bytes = libc::sendto(
                self.fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &self.send_addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(bytes as usize)
            }
        }
    }

    /// Receives a frame from the NIC.
    pub fn recv(&mut self, frame: &mut [u8]) -> io::Result<(usize, Addr)> {
        // Note comment in `send` call.
        unsafe {
            let mut storage = MaybeUninit::<libc::sockaddr_storage>::zeroed();
            let mut addrlen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

            // Resources:
            // https://beej.us/guide/bgnet/html/multi/syscalls.html#sendtorecv
            let bytes = libc::recvfrom(
                self.fd,
                frame.as_mut_ptr() as *mut libc::c_void,
                frame.len(),
                0,
                storage.as_mut_ptr() as *mut libc::sockaddr,
                &mut addrlen,
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok((
                    bytes as usize,
                    Addr {
                        inner: storage.assume_init(),
                        _len: addrlen,
                    },
                ))
            }
        }
    }

    /// Turns promiscuous mode on or off on this NIC. Useful for receiving all packets on an
    /// interface, including those not addressed to the device.
    pub fn set_promiscuous(&mut self, promiscuous: bool) -> io::Result<()> {
        let mreq = linux::packet_mreq {
            mr_ifindex: self.send_addr.sll_ifindex,
            mr_type: linux::PACKET_MR_PROMISC,
            mr_alen: 0,
            mr_address: [0; 8],
        };
        let option = if promiscuous {
            linux::PACKET_ADD_MEMBERSHIP
        } else {
            linux::PACKET_DROP_MEMBERSHIP
        };
        // Resources:
        // man 7 packet, "Socket options"
        let err = unsafe {
            libc::setsockopt(
                self.fd,
                linux::SOL_PACKET,
                option,
                &mreq as *const linux::packet_mreq as *const libc::c_void,
                mem::size_of::<linux::packet_mreq>() as libc::socklen_t,
            )
        };
        if err < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// The kernel's index of the interface this socket is bound to.
    pub fn interface_index(&self) -> i32 {
        self.send_addr.sll_ifindex
    }

    /// Queries the hardware (MAC) address of the bound interface.
    pub fn hardware_addr(&self) -> io::Result<[u8; 6]> {
        // The ifreq is owned by this frame; the kernel writes the address into ifru_hwaddr.
        // Resources:
        // man 7 netdevice, SIOCGIFHWADDR
        let hwaddr = unsafe {
            let mut ifr = ifreq_for(&self.name);
            let err = libc::ioctl(self.fd, linux::SIOCGIFHWADDR, &mut ifr as *mut linux::ifreq);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            ifr.ifr_ifru.ifru_hwaddr
        };
        let mut mac = [0u8; 6];
        for (byte, raw) in mac.iter_mut().zip(hwaddr.sa_data.iter()) {
            *byte = *raw as u8;
        }
        Ok(mac)
    }

    /// Queries the primary IPv4 address of the bound interface.
    pub fn ipv4_addr(&self) -> io::Result<Ipv4Addr> {
        // Packet sockets forward SIOCGIFADDR to the inet ioctl handler.
        // Resources:
        // man 7 netdevice, SIOCGIFADDR
        let addr = unsafe {
            let mut ifr = ifreq_for(&self.name);
            let err = libc::ioctl(self.fd, linux::SIOCGIFADDR, &mut ifr as *mut linux::ifreq);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            ifr.ifr_ifru.ifru_addr
        };
        if libc::c_int::from(addr.sa_family) != libc::AF_INET {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "interface has no IPv4 address",
            ));
        }
        // sockaddr_in: the port occupies sa_data[0..2], the address sa_data[2..6]
        let d = addr.sa_data;
        Ok(Ipv4Addr::new(d[2] as u8, d[3] as u8, d[4] as u8, d[5] as u8))
    }
}

impl AsRawFd for BoundSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Blocks until at least one of `sockets` has a frame waiting (or an error pending) and returns
/// the indices of those sockets. `None` waits forever; an expired timeout returns an empty list.
pub fn poll_readable(sockets: &[BoundSocket], timeout: Option<Duration>) -> io::Result<Vec<usize>> {
    let mut fds: Vec<libc::pollfd> = sockets
        .iter()
        .map(|socket| libc::pollfd {
            fd: socket.fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    let timeout_ms = match timeout {
        Some(timeout) => timeout.as_millis().min(libc::c_int::max_value() as u128) as libc::c_int,
        None => -1,
    };

    loop {
        // The pollfd array is owned by this function and its length is passed along with it.
        // Resources:
        // man 2 poll
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(fds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0)
            .map(|(index, _)| index)
            .collect());
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
