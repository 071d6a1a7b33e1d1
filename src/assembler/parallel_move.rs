// Sequentialization of parallel register moves.
//
// A parallel move {(s1 → d1), (s2 → d2), ...} reads every source before any
// destination is written. Emitting the pairs one after another is wrong as
// soon as a destination is also a later source, so each pair is resolved
// depth-first: before writing `d`, every pending move that still reads `d`
// is performed first. A pending move found mid-resolution closes a cycle; its
// source is parked in the scratch register and the move reads from there.
//
// Destinations must be pairwise distinct and must not include the scratch
// register. Sources may repeat.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Status {
    ToMove,
    BeingMoved,
    Moved,
}

struct Resolver<'a, R> {
    src: Vec<R>,
    dst: &'a [R],
    status: Vec<Status>,
    tmp: R,
    out: Vec<(R, R)>,
}

impl<R: Copy + Eq> Resolver<'_, R> {
    fn move_one(&mut self, i: usize) {
        if self.src[i] != self.dst[i] {
            self.status[i] = Status::BeingMoved;
            for j in 0..self.src.len() {
                if self.src[j] != self.dst[i] {
                    continue;
                }
                match self.status[j] {
                    Status::ToMove => self.move_one(j),
                    Status::BeingMoved => {
                        self.out.push((self.src[j], self.tmp));
                        self.src[j] = self.tmp;
                    }
                    Status::Moved => {}
                }
            }
            self.out.push((self.src[i], self.dst[i]));
        }
        self.status[i] = Status::Moved;
    }
}

/// Turn simultaneous `(src, dst)` moves into an equivalent sequence of
/// ordinary moves, using `tmp` to break cycles. Self-moves produce nothing.
pub fn resolve_parallel_moves<R: Copy + Eq>(moves: &[(R, R)], tmp: R) -> Vec<(R, R)> {
    let dst: Vec<R> = moves.iter().map(|&(_, d)| d).collect();
    let mut resolver = Resolver {
        src: moves.iter().map(|&(s, _)| s).collect(),
        dst: &dst,
        status: vec![Status::ToMove; moves.len()],
        tmp,
        out: Vec::with_capacity(moves.len() + 1),
    };
    for i in 0..moves.len() {
        if resolver.status[i] == Status::ToMove {
            resolver.move_one(i);
        }
    }
    resolver.out
}
